//! Store locations and their URI encoding.
//!
//! A URI has the shape `<scheme>:<remainder>`. The scheme picks the driver;
//! the remainder is backend-specific and is checked against the
//! [`LocationKind`] the driver registered for that scheme.

use std::fmt;
use std::path::Path;

use stowage_common::{Error, Result};

/// Shape of the backend-specific part of a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// `//` followed by an absolute filesystem path, e.g. `file:///srv/img`.
    Path,
    /// `//` followed by a non-empty object key, e.g. `mem://image-01`.
    Key,
    /// Any non-empty remainder. The driver interprets it on its own.
    Opaque,
}

impl LocationKind {
    /// Check that `remainder` is well formed for this kind.
    pub fn validate(&self, remainder: &str) -> Result<()> {
        match self {
            LocationKind::Path => {
                let path = remainder.strip_prefix("//").unwrap_or_default();
                if !path.starts_with('/') {
                    return Err(Error::BadStoreUri(format!(
                        "expected '///<absolute path>', got '{}'",
                        remainder
                    )));
                }
                Ok(())
            }
            LocationKind::Key => match remainder.strip_prefix("//") {
                Some(key) if !key.is_empty() => Ok(()),
                _ => Err(Error::BadStoreUri(format!(
                    "expected '//<key>', got '{}'",
                    remainder
                ))),
            },
            LocationKind::Opaque => {
                if remainder.is_empty() {
                    return Err(Error::BadStoreUri("empty location".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Split a URI into its scheme and backend-specific remainder.
///
/// The scheme is everything before the first `:` and must follow RFC 3986:
/// an ASCII letter followed by letters, digits, `+`, `-` or `.`.
pub fn split_scheme(uri: &str) -> Result<(&str, &str)> {
    let (scheme, remainder) = uri
        .split_once(':')
        .ok_or_else(|| Error::BadStoreUri(format!("missing scheme in '{}'", uri)))?;

    if !is_valid_scheme(scheme) {
        return Err(Error::BadStoreUri(format!(
            "invalid scheme '{}' in '{}'",
            scheme, uri
        )));
    }

    Ok((scheme, remainder))
}

/// Check a scheme name against the RFC 3986 grammar.
pub fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Address of one stored object.
///
/// Created per call by decoding a URI or by a driver after an add; never
/// persisted by the core. Encoding is lossless: `Location::uri` always
/// reproduces the URI the location was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    store_name: String,
    scheme: String,
    remainder: String,
    kind: LocationKind,
}

impl Location {
    /// Build a location from already-split parts, validating the remainder.
    pub fn new(
        store_name: impl Into<String>,
        scheme: impl Into<String>,
        remainder: impl Into<String>,
        kind: LocationKind,
    ) -> Result<Self> {
        let scheme = scheme.into();
        let remainder = remainder.into();
        if !is_valid_scheme(&scheme) {
            return Err(Error::BadStoreUri(format!("invalid scheme '{}'", scheme)));
        }
        kind.validate(&remainder)?;
        Ok(Self {
            store_name: store_name.into(),
            scheme,
            remainder,
            kind,
        })
    }

    /// Location of a file on the local filesystem.
    pub fn for_path(
        store_name: impl Into<String>,
        scheme: impl Into<String>,
        path: &Path,
    ) -> Result<Self> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("non UTF-8 path {}", path.display())))?;
        Self::new(store_name, scheme, format!("//{}", path), LocationKind::Path)
    }

    /// Location of a keyed object.
    pub fn for_key(
        store_name: impl Into<String>,
        scheme: impl Into<String>,
        key: &str,
    ) -> Result<Self> {
        Self::new(store_name, scheme, format!("//{}", key), LocationKind::Key)
    }

    /// Name of the driver that owns this location.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Backend-specific part of the URI, exactly as it was encoded.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Filesystem path, for [`LocationKind::Path`] locations.
    pub fn path(&self) -> Option<&Path> {
        match self.kind {
            LocationKind::Path => self.remainder.strip_prefix("//").map(Path::new),
            _ => None,
        }
    }

    /// Object key, for [`LocationKind::Key`] locations.
    pub fn key(&self) -> Option<&str> {
        match self.kind {
            LocationKind::Key => self.remainder.strip_prefix("//"),
            _ => None,
        }
    }

    /// Encode this location as a URI.
    pub fn uri(&self) -> String {
        format!("{}:{}", self.scheme, self.remainder)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.remainder)
    }
}
