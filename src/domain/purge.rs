//! Purge instructions addressed to the CDN API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A full-cache purge for one CDN service. Carries no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeRequest {
    pub service_id: String,
}

impl PurgeRequest {
    /// Path relative to the CDN API base.
    pub fn path(&self) -> String {
        format!("service/{}/purge_all", self.service_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedContentRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
}

/// Raised by the publishing pipeline after content goes live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPublished {
    #[serde(default)]
    pub items: Vec<PublishedContentRef>,
}
