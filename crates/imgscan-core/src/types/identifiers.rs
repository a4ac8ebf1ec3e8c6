//! Validated image identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{IMAGE_ID_LEN, SHORT_ID_LEN};
use crate::errors::IdentifierError;

/// A 64-character lowercase hex content identifier.
///
/// Construction always goes through [`ImageId::parse`], so holding an
/// `ImageId` proves the value is well formed. Uppercase input is accepted
/// and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        if input.len() != IMAGE_ID_LEN {
            return Err(IdentifierError::Invalid {
                input: input.to_string(),
                reason: "must be exactly 64 characters",
            });
        }
        if !input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdentifierError::Invalid {
                input: input.to_string(),
                reason: "must contain only 0-9, a-f, A-F",
            });
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, as shown in listings.
    pub fn short_id(&self) -> &str {
        &self.0[..SHORT_ID_LEN]
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ImageId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_normalizes_uppercase() {
        let id = ImageId::parse(&"AB".repeat(32)).unwrap();
        assert_eq!(id.as_str(), "ab".repeat(32));
        assert_eq!(id.short_id(), "abababababab");
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!(ImageId::parse("abc").is_err());
        assert!(ImageId::parse(&"g".repeat(64)).is_err());
        assert!(ImageId::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn serde_rejects_invalid_ids() {
        let bad: Result<ImageId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
        let good: ImageId = serde_json::from_str(&format!("\"{}\"", "f".repeat(64))).unwrap();
        assert_eq!(good.as_str(), "f".repeat(64));
    }
}
