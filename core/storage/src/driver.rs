//! Storage driver trait definition.

use std::collections::BTreeSet;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stowage_common::{Error, ObjectId, Operation, Result};

use crate::chunked::DataSource;
use crate::location::{Location, LocationKind};

/// Byte stream type for download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Result of a successful add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// URI the object can be retrieved from.
    pub uri: String,
    /// Number of bytes actually stored.
    pub size: u64,
    /// Hex digest of the stored bytes.
    pub checksum: String,
    /// Driver-specific location metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Optional operations a driver implements.
///
/// Add, get and get_size are part of every driver. Everything here is
/// queried before the call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub delete: bool,
    pub set_acls: bool,
}

impl Capabilities {
    /// Mandatory operations only: no delete, no ACLs.
    pub const BASIC: Self = Self {
        delete: false,
        set_acls: false,
    };

    /// Every optional operation.
    pub const ALL: Self = Self {
        delete: true,
        set_acls: true,
    };

    /// Whether the operation can be dispatched to a driver with these
    /// capabilities.
    pub fn supports(&self, op: Operation) -> bool {
        match op {
            Operation::Add | Operation::Get | Operation::GetSize => true,
            Operation::Delete => self.delete,
            Operation::SetAcls => self.set_acls,
        }
    }
}

/// Per-request context handed to drivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation id for log events.
    pub request_id: Uuid,
    /// Tenant on whose behalf the request runs, if any.
    pub tenant: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant: None,
        }
    }

    pub fn for_tenant(tenant: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            ..Self::new()
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Access policy applied by [`Driver::set_acls`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessControl {
    pub public: bool,
    pub read_principals: Vec<String>,
    pub write_principals: Vec<String>,
}

impl AccessControl {
    /// Public read access, no extra principals.
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }
}

/// Storage driver trait for different backends.
///
/// A driver is created and configured once at startup, then shared by all
/// callers through the [`crate::Registry`]. Implementations must handle
/// their own authentication and concurrency.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Get the driver name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Prepare the driver for use.
    ///
    /// Called exactly once, before the driver is registered.
    ///
    /// # Errors
    /// - Invalid or unusable configuration
    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    /// URI schemes this driver serves.
    fn supported_schemes(&self) -> BTreeSet<String>;

    /// Shape of the URI remainder this driver produces and accepts.
    fn location_kind(&self) -> LocationKind;

    /// Optional operations this driver implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::BASIC
    }

    /// Store the data for `object_id`.
    ///
    /// `size` is the caller-declared size and may be zero when unknown.
    ///
    /// # Postconditions
    /// - The returned URI decodes to a location of this driver
    ///
    /// # Errors
    /// - `AlreadyExists` if the object is already stored
    /// - Backend/I/O errors
    async fn add(&self, object_id: &ObjectId, data: DataSource, size: u64)
        -> Result<StoredObject>;

    /// Stream the object's bytes starting at `offset`.
    ///
    /// `chunk_size` is a hint for the size of produced chunks.
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    async fn get(
        &self,
        location: &Location,
        offset: u64,
        chunk_size: Option<usize>,
        context: &RequestContext,
    ) -> Result<ByteStream>;

    /// Size in bytes of the stored object.
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    async fn get_size(&self, location: &Location, context: &RequestContext) -> Result<u64>;

    /// Remove the object.
    ///
    /// Only called when [`Capabilities::delete`] is set.
    async fn delete(&self, _location: &Location, _context: &RequestContext) -> Result<()> {
        Err(Error::Unsupported(Operation::Delete))
    }

    /// Apply an access policy to the object.
    ///
    /// Only called when [`Capabilities::set_acls`] is set.
    async fn set_acls(&self, _location: &Location, _access: &AccessControl) -> Result<()> {
        Err(Error::Unsupported(Operation::SetAcls))
    }
}
