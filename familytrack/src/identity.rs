//! Device identity.
//!
//! Every tracked device is addressed by an identifier assigned once by the
//! management dashboard (a UUID in canonical textual form). The reporting core
//! refuses to start without a valid one.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors produced when validating a device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identifier is empty.
    #[error("device id is empty")]
    Empty,

    /// The identifier is not a canonical UUID.
    #[error("device id '{0}' is not a UUID (expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)")]
    Malformed(String),
}

/// Validated device identifier.
///
/// The original casing is preserved; the backend compares ids as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .unwrap()
    })
}

/// Check whether `candidate` is a UUID in canonical textual form.
pub fn is_valid_device_id(candidate: &str) -> bool {
    uuid_pattern().is_match(candidate)
}

impl DeviceId {
    /// Validate and wrap a device identifier.
    ///
    /// Surrounding whitespace is not trimmed: a stored id with stray spaces is
    /// treated as corrupt rather than silently repaired.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if !is_valid_device_id(raw) {
            return Err(IdentityError::Malformed(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The identifier as sent to the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_uuid() {
        let id = DeviceId::parse("11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(id.as_str(), "11111111-1111-1111-1111-111111111111");
    }

    #[test]
    fn accepts_mixed_case_hex() {
        assert!(is_valid_device_id("A1b2C3d4-E5f6-4a7B-8c9D-0e1F2a3B4c5D"));
    }

    #[test]
    fn rejects_non_uuid_text() {
        assert_eq!(
            DeviceId::parse("not-a-uuid"),
            Err(IdentityError::Malformed("not-a-uuid".to_string()))
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(DeviceId::parse(""), Err(IdentityError::Empty));
    }

    #[test]
    fn rejects_missing_hex_digit() {
        // 31 hex digits: last group is one short
        let short = "11111111-1111-1111-1111-11111111111";
        assert_eq!(short.len(), 35);
        assert_eq!(short.chars().filter(|c| c.is_ascii_hexdigit()).count(), 31);
        assert!(DeviceId::parse(short).is_err());

        let bare = "1".repeat(31);
        assert_eq!(bare.len(), 31);
        assert!(DeviceId::parse(&bare).is_err());
    }

    #[test]
    fn rejects_surrounding_whitespace() {
        assert!(DeviceId::parse(" 11111111-1111-1111-1111-111111111111").is_err());
        assert!(DeviceId::parse("11111111-1111-1111-1111-111111111111\n").is_err());
    }

    #[test]
    fn rejects_non_hex_characters() {
        assert!(!is_valid_device_id("g1111111-1111-1111-1111-111111111111"));
    }

    #[test]
    fn from_str_and_display_round_trip() {
        let id: DeviceId = "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap();
        assert_eq!(id.to_string(), "0f8fad5b-d9cb-469f-a165-70867728950e");
    }
}
