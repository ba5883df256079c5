//! Ordered authorization tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a tier from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTierError {
    /// The input that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseTierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown authorization tier '{}'", self.input)
    }
}

impl std::error::Error for ParseTierError {}

/// Authorization tier a route group requires and an identity may hold.
///
/// Tiers are totally ordered: a grant of a higher tier satisfies every
/// lower requirement. `NoAuth` routes admit everyone without a lookup.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Public; no identity required.
    #[default]
    #[serde(alias = "none")]
    NoAuth,
    /// Read-only access to the API.
    Read,
    /// Read and write access.
    ReadWrite,
    /// Administrative access.
    Admin,
}

impl Tier {
    /// Returns the wire name of the tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAuth => "noauth",
            Self::Read => "read",
            Self::ReadWrite => "readwrite",
            Self::Admin => "admin",
        }
    }

    /// Returns true if a grant of `self` satisfies a `required` tier.
    #[must_use]
    pub fn satisfies(self, required: Tier) -> bool {
        required == Tier::NoAuth || self >= required
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noauth" | "none" => Ok(Self::NoAuth),
            "read" => Ok(Self::Read),
            "readwrite" => Ok(Self::ReadWrite),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseTierError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(Tier::NoAuth < Tier::Read);
        assert!(Tier::Read < Tier::ReadWrite);
        assert!(Tier::ReadWrite < Tier::Admin);
    }

    #[test]
    fn higher_grant_satisfies_lower_requirement() {
        assert!(Tier::Admin.satisfies(Tier::Read));
        assert!(Tier::Read.satisfies(Tier::Read));
        assert!(!Tier::Read.satisfies(Tier::Admin));
    }

    #[test]
    fn noauth_requirement_is_always_satisfied() {
        assert!(Tier::NoAuth.satisfies(Tier::NoAuth));
    }

    #[test]
    fn noauth_grant_does_not_satisfy_read() {
        assert!(!Tier::NoAuth.satisfies(Tier::Read));
    }

    #[test]
    fn parse_accepts_none_alias() {
        assert_eq!("none".parse::<Tier>(), Ok(Tier::NoAuth));
        assert_eq!("NoAuth".parse::<Tier>(), Ok(Tier::NoAuth));
        assert_eq!("readwrite".parse::<Tier>(), Ok(Tier::ReadWrite));
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "superuser".parse::<Tier>().unwrap_err();
        assert_eq!(err.input, "superuser");
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Tier::ReadWrite).expect("serialize");
        assert_eq!(json, "\"readwrite\"");

        let parsed: Tier = serde_json::from_str("\"none\"").expect("deserialize");
        assert_eq!(parsed, Tier::NoAuth);
    }
}
