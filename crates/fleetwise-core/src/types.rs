use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FleetwiseError;

/// Numeric identifier of a managed site.
///
/// The aggregated snapshot keys sites by their decimal string form; every
/// comparison inside the engine happens on the parsed number so `"007"` and
/// `"7"` name the same site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for SiteId {
    type Err = FleetwiseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SiteId)
            .map_err(|_| FleetwiseError::InvalidSiteId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_leading_zeros_and_whitespace() {
        let a: SiteId = "007".parse().unwrap();
        let b: SiteId = " 7 ".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, SiteId(7));
    }

    #[test]
    fn parse_rejects_non_numeric() {
        let err = "abc".parse::<SiteId>().unwrap_err();
        assert_eq!(err.code(), "INVALID_SITE_ID");
        assert!("-1".parse::<SiteId>().is_err());
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&SiteId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
