//! CDN cache-control headers and purge-on-publish for content publishing
//! pipelines.
//!
//! The core is two pure pieces:
//! [`application::cache_policy::resolve_cache_directive`] decides the cache
//! lifetime of a response, and [`application::purge::build_purge_request`]
//! addresses a full-cache purge. [`infra::http`] adapts them to axum
//! (response middleware and a publish webhook) and [`infra::fastly`] talks
//! to the Fastly API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
