//! Purge-on-publish: best-effort, at-most-once CDN invalidation.
//!
//! A publish never fails because of the purge. Transport errors and
//! rejected calls are logged and counted, then dropped.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::PurgeMode,
    domain::purge::{ContentPublished, PurgeRequest},
};

pub const METRIC_PURGE_TOTAL: &str = "cachepilot_purge_total";

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("purge request failed: {0}")]
    Transport(String),
    #[error("CDN rejected purge with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid purge target: {0}")]
    InvalidTarget(String),
}

/// Status returned by the CDN for an accepted purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReceipt {
    pub status: u16,
}

/// Outbound seam to the CDN API.
#[async_trait]
pub trait CdnPurger: Send + Sync {
    async fn purge_all(&self, request: &PurgeRequest) -> Result<PurgeReceipt, PurgeError>;
}

pub fn build_purge_request(service_id: &str) -> PurgeRequest {
    PurgeRequest {
        service_id: service_id.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Purge-on-publish is disabled; no call was made.
    Skipped,
    Purged(PurgeReceipt),
    /// The call failed; the publish still succeeds.
    Failed,
    /// The call was spawned without waiting for it.
    Dispatched,
}

impl PublishOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishOutcome::Skipped => "skipped",
            PublishOutcome::Purged(_) => "purged",
            PublishOutcome::Failed => "failed",
            PublishOutcome::Dispatched => "dispatched",
        }
    }
}

#[derive(Clone)]
struct PurgeTarget {
    purger: Arc<dyn CdnPurger>,
    request: PurgeRequest,
}

/// Publish-event listener that purges the whole CDN service cache.
#[derive(Clone)]
pub struct PurgeOnPublish {
    target: Option<PurgeTarget>,
    mode: PurgeMode,
}

impl PurgeOnPublish {
    pub fn new(purger: Arc<dyn CdnPurger>, service_id: &str, mode: PurgeMode) -> Self {
        Self {
            target: Some(PurgeTarget {
                purger,
                request: build_purge_request(service_id),
            }),
            mode,
        }
    }

    pub fn disabled() -> Self {
        Self {
            target: None,
            mode: PurgeMode::Await,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub async fn content_published(&self, event: &ContentPublished) -> PublishOutcome {
        let Some(target) = self.target.clone() else {
            debug!(
                target = "cachepilot::purge",
                items = event.items.len(),
                "purge on publish disabled"
            );
            return PublishOutcome::Skipped;
        };

        info!(
            target = "cachepilot::purge",
            service_id = %target.request.service_id,
            items = event.items.len(),
            mode = ?self.mode,
            "content published, purging CDN cache"
        );

        match self.mode {
            PurgeMode::Await => run_purge(&target).await,
            PurgeMode::Detached => {
                tokio::spawn(async move {
                    run_purge(&target).await;
                });
                PublishOutcome::Dispatched
            }
        }
    }
}

async fn run_purge(target: &PurgeTarget) -> PublishOutcome {
    match target.purger.purge_all(&target.request).await {
        Ok(receipt) => {
            counter!(METRIC_PURGE_TOTAL, "outcome" => "ok").increment(1);
            info!(
                target = "cachepilot::purge",
                service_id = %target.request.service_id,
                status = receipt.status,
                "CDN purge accepted"
            );
            PublishOutcome::Purged(receipt)
        }
        Err(err) => {
            counter!(METRIC_PURGE_TOTAL, "outcome" => "failed").increment(1);
            warn!(
                target = "cachepilot::purge",
                service_id = %target.request.service_id,
                error = %err,
                "CDN purge failed; publish unaffected"
            );
            PublishOutcome::Failed
        }
    }
}
