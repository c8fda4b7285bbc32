//! Release identifiers.
//!
//! Tags follow the single-digit `vX.Y.Z` pattern the library has used
//! for every published release. They are parsed into a numeric triple
//! and compared structurally, so ordering stays correct even if a
//! multi-digit component ever appears in the pattern — a raw string
//! comparison would silently misorder `v1.10.0` below `v1.9.0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// A published release tag, e.g. `v1.8.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReleaseTag {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ReleaseTag {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ReleaseTag {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || HarnessError::BadTag(s.to_string());
        let rest = s.strip_prefix('v').ok_or_else(bad)?;
        let mut parts = rest.split('.');
        let mut next = || -> Result<u8, HarnessError> {
            let p = parts.next().ok_or_else(bad)?;
            // Single-digit components only; this matches the git tag
            // glob used for discovery, so anything else is malformed.
            if p.len() != 1 {
                return Err(bad());
            }
            p.parse::<u8>().map_err(|_| bad())
        };
        let tag = ReleaseTag::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(tag)
    }
}

/// A release under test: either a published tag or the working tree.
///
/// `Head` is the "current" side of every comparison the harness makes.
/// It is never ordered against tags and always sits first in catalog
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseId {
    /// The live working tree.
    Head,
    /// A published release tag.
    Tagged(ReleaseTag),
}

impl ReleaseId {
    /// Whether this is the working-tree sentinel.
    pub fn is_head(&self) -> bool {
        matches!(self, ReleaseId::Head)
    }

    /// The underlying tag, if any.
    pub fn tag(&self) -> Option<&ReleaseTag> {
        match self {
            ReleaseId::Head => None,
            ReleaseId::Tagged(t) => Some(t),
        }
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseId::Head => write!(f, "HEAD"),
            ReleaseId::Tagged(t) => t.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_digit_triple() {
        let tag: ReleaseTag = "v1.8.3".parse().unwrap();
        assert_eq!(tag, ReleaseTag::new(1, 8, 3));
        assert_eq!(tag.to_string(), "v1.8.3");
    }

    #[test]
    fn rejects_multi_digit_components() {
        assert!("v1.10.0".parse::<ReleaseTag>().is_err());
        assert!("v12.0.0".parse::<ReleaseTag>().is_err());
    }

    #[test]
    fn rejects_malformed_tags() {
        assert!("1.8.3".parse::<ReleaseTag>().is_err());
        assert!("v1.8".parse::<ReleaseTag>().is_err());
        assert!("v1.8.3.1".parse::<ReleaseTag>().is_err());
        assert!("v1.8.x".parse::<ReleaseTag>().is_err());
        assert!("".parse::<ReleaseTag>().is_err());
    }

    #[test]
    fn ordering_is_numeric_on_the_triple() {
        let a = ReleaseTag::new(1, 7, 5);
        let b = ReleaseTag::new(1, 8, 0);
        let c = ReleaseTag::new(2, 0, 0);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, ReleaseTag::new(1, 7, 5));
    }

    #[test]
    fn head_displays_as_sentinel() {
        assert_eq!(ReleaseId::Head.to_string(), "HEAD");
        assert_eq!(
            ReleaseId::Tagged(ReleaseTag::new(1, 9, 4)).to_string(),
            "v1.9.4"
        );
        assert!(ReleaseId::Head.is_head());
        assert!(ReleaseId::Head.tag().is_none());
    }
}
