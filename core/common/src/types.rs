//! Common types used throughout Stowage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored object, as chosen by the caller.
///
/// Drivers derive file names and keys from it, so it is restricted to a
/// single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new ObjectId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    /// - `id` must not contain path separators or NUL bytes
    /// - `id` must not be `.` or `..`
    ///
    /// # Errors
    /// - Returns `InvalidInput` if any precondition is violated
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "ObjectId cannot be empty".to_string(),
            ));
        }
        if id.contains('/') || id.contains('\\') || id.contains('\0') {
            return Err(crate::Error::InvalidInput(format!(
                "ObjectId '{}' cannot contain separators",
                id.escape_debug()
            )));
        }
        if id == "." || id == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "ObjectId '{}' is reserved",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ObjectId {
    type Error = crate::Error;

    fn try_from(value: &str) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_id_creation() {
        let id = ObjectId::new("image-01").unwrap();
        assert_eq!(id.as_str(), "image-01");
    }

    #[test]
    fn test_object_id_empty_fails() {
        assert!(ObjectId::new("").is_err());
    }

    #[test]
    fn test_object_id_separators_fail() {
        assert!(ObjectId::new("a/b").is_err());
        assert!(ObjectId::new("a\\b").is_err());
        assert!(ObjectId::new("a\0b").is_err());
    }

    #[test]
    fn test_object_id_dots_reserved() {
        assert!(ObjectId::new(".").is_err());
        assert!(ObjectId::new("..").is_err());
        assert!(ObjectId::new("...").is_ok());
    }

    #[test]
    fn test_object_id_deserialize_validates() {
        let ok: ObjectId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<ObjectId>("\"a/b\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_plain_ids_are_accepted(id in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,40}") {
            prop_assume!(id != "." && id != "..");
            let parsed = ObjectId::new(id.clone()).unwrap();
            prop_assert_eq!(parsed.as_str(), id.as_str());
        }
    }
}
