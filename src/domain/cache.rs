//! Cache directives emitted towards the upstream CDN.

use std::{fmt, num::NonZeroU32};

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

/// IMF-fixdate, the preferred HTTP-date format (`Sun, 06 Nov 1994 08:49:37 GMT`).
const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    Public,
}

impl Cacheability {
    pub fn as_str(self) -> &'static str {
        match self {
            Cacheability::Public => "public",
        }
    }
}

impl fmt::Display for Cacheability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caching instructions for a single response.
///
/// A directive only exists for a positive max-age; a non-positive lifetime
/// yields no directive at all and the response keeps whatever cacheability
/// it already had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirective {
    pub cacheability: Cacheability,
    pub max_age: NonZeroU32,
    pub expires: OffsetDateTime,
    pub stale_while_revalidate: Option<NonZeroU32>,
}

impl CacheDirective {
    /// Render the `Cache-Control` header value.
    pub fn cache_control_value(&self) -> String {
        let mut value = format!("{}, max-age={}", self.cacheability, self.max_age);
        if let Some(stale) = self.stale_while_revalidate {
            value.push_str(&format!(", stale-while-revalidate={stale}"));
        }
        value
    }

    /// Render the `Expires` header value as an HTTP-date.
    pub fn expires_value(&self) -> String {
        self.expires
            .to_offset(UtcOffset::UTC)
            .format(HTTP_DATE)
            .unwrap_or_default()
    }
}
