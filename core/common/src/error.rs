//! Common error types for Stowage.
//!
//! Every driver failure is normalized into one of these variants before it
//! reaches a caller, so callers can tell "backend said no" apart from
//! "backend errored".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A storage operation that a driver may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Get,
    GetSize,
    Delete,
    SetAcls,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "add",
            Operation::Get => "get",
            Operation::GetSize => "get_size",
            Operation::Delete => "delete",
            Operation::SetAcls => "set_acls",
        };
        f.write_str(name)
    }
}

/// Top-level error type for Stowage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No driver is registered for the requested scheme.
    #[error("Unknown scheme '{0}' found in URI")]
    UnknownScheme(String),

    /// A driver failed to load, declared no schemes, or the default
    /// scheme has no driver behind it.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resolved driver does not implement the operation.
    #[error("Operation '{0}' is not supported by this store")]
    Unsupported(Operation),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Driver-returned metadata contains a value of a disallowed type.
    #[error(
        "Driver '{driver}' returned invalid metadata: key '{path}' has type {observed}, \
         only objects, arrays and strings are supported"
    )]
    InvalidMetadata {
        driver: String,
        path: String,
        observed: &'static str,
    },

    /// Opaque backend failure, passed through unmodified.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The URI could not be parsed into a store location.
    #[error("Bad store URI: {0}")]
    BadStoreUri(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// True when the failure came from resolving a URI or scheme rather
    /// than from the driver itself.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Error::UnknownScheme(_) | Error::BadStoreUri(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(e.to_string())
        } else {
            Error::Backend(e.to_string())
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_other_io_maps_to_backend() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[test]
    fn test_unsupported_message_names_operation() {
        let err = Error::Unsupported(Operation::GetSize);
        assert_eq!(
            err.to_string(),
            "Operation 'get_size' is not supported by this store"
        );
    }

    #[test]
    fn test_resolution_failures() {
        assert!(Error::UnknownScheme("s3".into()).is_resolution_failure());
        assert!(Error::BadStoreUri("nope".into()).is_resolution_failure());
        assert!(!Error::NotFound("x".into()).is_resolution_failure());
    }

    #[test]
    fn test_operation_serializes_snake_case() {
        let json = serde_json::to_string(&Operation::SetAcls).unwrap();
        assert_eq!(json, "\"set_acls\"");
    }
}
