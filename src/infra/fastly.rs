//! Fastly API client used for purge-all calls.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    Client, Url,
    header::{ACCEPT, HeaderMap, HeaderName, HeaderValue},
};
use tracing::{debug, info, warn};

use crate::{
    application::purge::{CdnPurger, PurgeError, PurgeOnPublish, PurgeReceipt},
    config::FastlySettings,
    domain::purge::PurgeRequest,
};

use super::error::InfraError;

pub const FASTLY_KEY_HEADER: HeaderName = HeaderName::from_static("fastly-key");

/// Explicitly constructed client with the API base and static key baked in.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone, Debug)]
pub struct FastlyClient {
    client: Client,
    base: Url,
}

impl FastlyClient {
    pub fn new(base: Url, api_key: &str) -> Result<Self, InfraError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|err| InfraError::http_client(format!("invalid Fastly API key: {err}")))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(FASTLY_KEY_HEADER, key);

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .default_headers(headers)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self { client, base })
    }

    /// Build a client when an API key is configured.
    pub fn from_settings(settings: &FastlySettings) -> Result<Option<Self>, InfraError> {
        settings
            .api_key
            .as_deref()
            .map(|key| Self::new(settings.api_base.clone(), key))
            .transpose()
    }

    pub fn user_agent() -> &'static str {
        concat!("cachepilot/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn purge_url(&self, request: &PurgeRequest) -> Result<Url, PurgeError> {
        let id = request.service_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PurgeError::InvalidTarget(format!(
                "service id `{id}` must be non-empty and alphanumeric"
            )));
        }

        self.base
            .join(&request.path())
            .map_err(|err| PurgeError::InvalidTarget(err.to_string()))
    }
}

/// Purge-on-publish listener for the configured Fastly service.
///
/// Disabled unless `purge_all_on_publish` is set and both the service id
/// and the API key are present.
pub fn purge_on_publish(settings: &FastlySettings) -> Result<PurgeOnPublish, InfraError> {
    if !settings.purge_all_on_publish {
        info!(target = "cachepilot::purge", "purge on publish disabled");
        return Ok(PurgeOnPublish::disabled());
    }

    let Some(service_id) = settings.service_id.as_deref() else {
        warn!(
            target = "cachepilot::purge",
            "purge on publish requested but fastly.service_id is missing; disabled"
        );
        return Ok(PurgeOnPublish::disabled());
    };

    let Some(client) = FastlyClient::from_settings(settings)? else {
        warn!(
            target = "cachepilot::purge",
            "purge on publish requested but fastly.api_key is missing; disabled"
        );
        return Ok(PurgeOnPublish::disabled());
    };

    info!(
        target = "cachepilot::purge",
        service_id = service_id,
        api_base = %client.base(),
        mode = ?settings.purge_mode,
        "purge on publish enabled"
    );
    Ok(PurgeOnPublish::new(Arc::new(client), service_id, settings.purge_mode))
}

#[async_trait]
impl CdnPurger for FastlyClient {
    async fn purge_all(&self, request: &PurgeRequest) -> Result<PurgeReceipt, PurgeError> {
        let url = self.purge_url(request)?;
        debug!(target = "cachepilot::fastly", url = %url, "sending purge_all");

        let response = self
            .client
            .post(url)
            .body(String::new())
            .send()
            .await
            .map_err(|err| PurgeError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PurgeError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(PurgeReceipt {
            status: status.as_u16(),
        })
    }
}
