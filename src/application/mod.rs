//! Application services: cache-policy resolution and purge-on-publish.

pub mod cache_policy;
pub mod error;
pub mod purge;
