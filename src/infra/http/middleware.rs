use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    application::cache_policy::CachePolicy,
    domain::{cache::CacheDirective, content::ContentItem},
};

pub const METRIC_CACHE_DIRECTIVE_TOTAL: &str = "cachepilot_cache_directive_total";

/// Suppresses the App Service ARR affinity cookie, whose `Set-Cookie`
/// otherwise makes every response uncacheable at the CDN.
pub const ARR_DISABLE_AFFINITY_HEADER: HeaderName =
    HeaderName::from_static("arr-disable-session-affinity");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        error!(
            target = "cachepilot::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request failed",
        );
    } else if status.is_client_error() {
        warn!(
            target = "cachepilot::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "client request error",
        );
    } else {
        debug!(
            target = "cachepilot::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request served",
        );
    }

    response
}

/// Content resolved by a handler for the current response.
///
/// Handlers attach it to the response; [`cache_headers_layer`] reads it
/// once the response is prepared.
#[derive(Debug, Clone)]
pub struct ResolvedContent(pub ContentItem);

impl ResolvedContent {
    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheHeaderState {
    pub policy: CachePolicy,
    pub disable_affinity_cookie: bool,
}

/// Middleware applying CDN cache headers to responses for published content.
///
/// Responses pass through untouched when they carry no resolved content,
/// when their status is not 2xx, when the content is unpublished, or when
/// the effective max-age is not positive.
pub async fn cache_headers_layer(
    State(state): State<CacheHeaderState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let resolved = match response.extensions().get::<ResolvedContent>() {
        None => Err("no_content"),
        Some(_) if !response.status().is_success() => Err("not_success"),
        Some(ResolvedContent(content)) if !content.published => Err("unpublished"),
        Some(ResolvedContent(content)) => state
            .policy
            .resolve(content.cache_override())
            .ok_or("disabled"),
    };

    let outcome = match resolved {
        Ok(directive) => {
            apply_cache_directive(
                response.headers_mut(),
                &directive,
                state.disable_affinity_cookie,
            );
            "applied"
        }
        Err(skipped) => skipped,
    };

    counter!(METRIC_CACHE_DIRECTIVE_TOTAL, "outcome" => outcome).increment(1);
    response
}

/// Write `Cache-Control` and `Expires`, replacing earlier values.
pub fn apply_cache_directive(
    headers: &mut HeaderMap,
    directive: &CacheDirective,
    disable_affinity_cookie: bool,
) {
    if let Ok(value) = HeaderValue::from_str(&directive.cache_control_value()) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&directive.expires_value()) {
        headers.insert(header::EXPIRES, value);
    }
    if disable_affinity_cookie {
        headers.insert(ARR_DISABLE_AFFINITY_HEADER, HeaderValue::from_static("True"));
    }
}
