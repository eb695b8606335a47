//! Cache-policy resolution for published content.

use std::num::NonZeroU32;

use time::{Duration, OffsetDateTime};

use crate::{
    config::FastlySettings,
    domain::cache::{CacheDirective, Cacheability},
};

/// System-wide cache defaults, resolved once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub default_max_age: i32,
    pub stale_while_revalidate: Option<NonZeroU32>,
}

impl CachePolicy {
    pub fn new(default_max_age: i32, stale_while_revalidate: Option<NonZeroU32>) -> Self {
        Self {
            default_max_age,
            stale_while_revalidate,
        }
    }

    pub fn resolve(&self, content_override: Option<i32>) -> Option<CacheDirective> {
        resolve_cache_directive(self, content_override, OffsetDateTime::now_utc())
    }
}

impl From<&FastlySettings> for CachePolicy {
    fn from(settings: &FastlySettings) -> Self {
        Self::new(settings.max_age, settings.stale_while_revalidate)
    }
}

/// Compute the directive for one response.
///
/// The override, when present, replaces the default entirely, including
/// when it is zero or negative. A non-positive effective max-age yields
/// `None`. Stale-while-revalidate applies whatever the max-age source.
pub fn resolve_cache_directive(
    policy: &CachePolicy,
    content_override: Option<i32>,
    now: OffsetDateTime,
) -> Option<CacheDirective> {
    let effective = content_override.unwrap_or(policy.default_max_age);
    let max_age = u32::try_from(effective).ok().and_then(NonZeroU32::new)?;

    Some(CacheDirective {
        cacheability: Cacheability::Public,
        max_age,
        expires: now + Duration::seconds(i64::from(max_age.get())),
        stale_while_revalidate: policy.stale_while_revalidate,
    })
}
