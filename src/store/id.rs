//! Correlation identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::error::StoreError;

const MAX_ID_LEN: usize = 128;

/// Join key between a request record and its response record.
///
/// Generated ids are random (UUID v4, 122 bits of entropy). Parsed ids only need to be
/// safe as a file stem: ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate an identifier read from the store or a caller.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequestId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RequestId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: HashSet<_> = (0..10_000).map(|_| RequestId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_generated_ids_parse() {
        let id = RequestId::generate();
        assert_eq!(RequestId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        for raw in ["", "../etc", "a/b", "a.json", "id with space"] {
            assert!(RequestId::parse(raw).is_err(), "{raw:?} should be rejected");
        }
        assert!(RequestId::parse(&"x".repeat(129)).is_err());
        assert!(RequestId::parse("req_42-a").is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let id: RequestId = serde_json::from_str(r#""abc123""#).unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert!(serde_json::from_str::<RequestId>(r#""../x""#).is_err());
    }
}
