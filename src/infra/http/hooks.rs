use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{application::purge::PurgeOnPublish, domain::purge::ContentPublished};

#[derive(Clone)]
pub struct HookState {
    pub purge: PurgeOnPublish,
    pub hook_token: Option<Arc<str>>,
}

impl HookState {
    pub fn new(purge: PurgeOnPublish, hook_token: Option<String>) -> Self {
        Self {
            purge,
            hook_token: hook_token.map(Arc::from),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.hook_token.as_deref() else {
            return true;
        };

        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or("");

        presented.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1
    }
}

/// Publish webhook. Accepted regardless of the purge outcome.
pub(super) async fn content_published(
    State(state): State<HookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.authorized(&headers) {
        warn!(
            target = "cachepilot::http::hooks",
            "rejected publish hook with missing or invalid token"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let event = if body.iter().all(u8::is_ascii_whitespace) {
        ContentPublished::default()
    } else {
        match serde_json::from_slice::<ContentPublished>(&body) {
            Ok(event) => event,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid publish event: {err}") })),
                )
                    .into_response();
            }
        }
    };

    let outcome = state.purge.content_published(&event).await;

    (StatusCode::ACCEPTED, Json(json!({ "purge": outcome.as_str() }))).into_response()
}
