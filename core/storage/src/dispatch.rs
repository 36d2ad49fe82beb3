//! Dispatcher: the public entry point for storage operations.
//!
//! Every operation decodes the URI, resolves the driver through the
//! [`Registry`], calls it, and reports failures in the common error
//! taxonomy. `safe_delete` and `set_acls` are best-effort: they log
//! instead of failing for the cases listed on each method.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use stowage_common::{Error, ObjectId, Operation, Result};

use crate::catalog::DriverCatalog;
use crate::chunked::{ChunkSource, DataSource, Indexable};
use crate::config::StoreConfig;
use crate::driver::{AccessControl, ByteStream, RequestContext, StoredObject};
use crate::metadata::validate_location_metadata;
use crate::registry::Registry;

/// Routes storage operations to the driver that owns each URI.
///
/// Stateless apart from the shared registry; cheap to clone and safe to use
/// from many tasks at once.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    default_scheme: String,
}

impl Dispatcher {
    /// Create a dispatcher over a populated registry.
    ///
    /// # Errors
    /// - `Configuration` if `default_scheme` has no registered driver
    pub fn new(registry: Arc<Registry>, default_scheme: impl Into<String>) -> Result<Self> {
        let default_scheme = default_scheme.into();
        registry.verify_default(&default_scheme)?;
        Ok(Self {
            registry,
            default_scheme,
        })
    }

    /// Load the configured drivers and build a dispatcher over them.
    pub fn from_config(catalog: &DriverCatalog, config: &StoreConfig) -> Result<Self> {
        let mut registry = Registry::new();
        registry.load(catalog, config)?;
        Self::new(Arc::new(registry), config.default_store.clone())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Scheme used by [`Dispatcher::add`] when none is given.
    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }

    /// Schemes with a registered driver.
    pub fn known_schemes(&self) -> BTreeSet<String> {
        self.registry.known_schemes()
    }

    /// Scheme that would serve `uri`.
    pub fn store_name(&self, uri: &str) -> Result<String> {
        self.registry.store_name(uri)
    }

    /// Store data read from `source` under `object_id`.
    ///
    /// Uses the default scheme when `scheme` is `None`. `size` is the
    /// declared size of the data; zero means unknown.
    ///
    /// # Errors
    /// - `UnknownScheme` if the scheme has no driver
    /// - `Unsupported(Add)` if the driver reports it cannot store data
    /// - `InvalidMetadata` if the driver returns metadata that is not an
    ///   object of objects, arrays and strings
    /// - Anything the driver reports
    pub async fn add<S>(
        &self,
        object_id: &ObjectId,
        source: S,
        size: u64,
        scheme: Option<&str>,
    ) -> Result<StoredObject>
    where
        S: ChunkSource + 'static,
    {
        let scheme = scheme.unwrap_or(&self.default_scheme);
        let driver = self.registry.lookup(scheme)?;

        let source: Box<dyn ChunkSource> = Box::new(source);
        let data: DataSource = Indexable::new(source, size);
        let stored = driver.add(object_id, data, size).await?;

        if let Some(metadata) = &stored.metadata {
            if let Err(e) = validate_location_metadata(driver.name(), metadata) {
                error!(
                    driver = %driver.name(),
                    object_id = %object_id,
                    metadata = %metadata,
                    error = %e,
                    "A bad metadata structure was returned from the storage driver"
                );
                return Err(e);
            }
        }

        Ok(stored)
    }

    /// Stream the object at `uri`, starting at `offset`.
    ///
    /// # Errors
    /// - `BadStoreUri` / `UnknownScheme` if the URI cannot be resolved
    /// - `Unsupported(Get)` if the driver reports it cannot read data
    /// - `NotFound` if the object does not exist
    pub async fn get(
        &self,
        uri: &str,
        offset: u64,
        chunk_size: Option<usize>,
        context: &RequestContext,
    ) -> Result<ByteStream> {
        let (location, driver) = self.registry.resolve(uri)?;
        driver.get(&location, offset, chunk_size, context).await
    }

    /// Size in bytes of the object at `uri`.
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    pub async fn get_size(&self, uri: &str, context: &RequestContext) -> Result<u64> {
        let (location, driver) = self.registry.resolve(uri)?;
        driver.get_size(&location, context).await
    }

    /// Delete the object at `uri`.
    ///
    /// # Errors
    /// - `Unsupported(Delete)` if the driver cannot delete
    /// - `NotFound` if the object does not exist
    pub async fn delete(&self, uri: &str, context: &RequestContext) -> Result<()> {
        let (location, driver) = self.registry.resolve(uri)?;
        if !driver.capabilities().supports(Operation::Delete) {
            return Err(Error::Unsupported(Operation::Delete));
        }
        driver.delete(&location, context).await
    }

    /// Delete the object at `uri`, logging instead of failing.
    ///
    /// Meant for cleanup paths where a failed delete must not abort a
    /// larger rollback. Each swallowed failure produces one log event.
    pub async fn safe_delete(&self, uri: &str, object_id: &ObjectId, context: &RequestContext) {
        match self.delete(uri, context).await {
            Ok(()) => {}
            Err(Error::NotFound(_)) => {
                warn!(object_id = %object_id, uri, "Failed to delete object in store from URI");
            }
            Err(e @ Error::Unsupported(_)) => {
                warn!(object_id = %object_id, uri, error = %e, "Store does not support delete");
            }
            Err(e) if e.is_resolution_failure() => {
                error!(object_id = %object_id, uri, error = %e, "Failed to delete object from store");
            }
            Err(e) => {
                error!(object_id = %object_id, uri, error = %e, "Backend failure while deleting object");
            }
        }
    }

    /// Apply an access policy to the object at `uri`, best-effort.
    ///
    /// Drivers without ACL support are skipped with a debug event. Missing
    /// objects and unresolvable URIs are logged once and swallowed.
    ///
    /// # Errors
    /// - Any other failure an ACL-capable driver reports
    pub async fn set_acls(&self, uri: &str, access: &AccessControl) -> Result<()> {
        let (location, driver) = match self.registry.resolve(uri) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(uri, error = %e, "Failed to set access controls, store not resolvable");
                return Ok(());
            }
        };
        if !driver.capabilities().supports(Operation::SetAcls) {
            debug!(driver = %driver.name(), uri, "Skipping set_acls, not implemented by store");
            return Ok(());
        }

        match driver.set_acls(&location, access).await {
            Err(Error::Unsupported(_)) => {
                debug!(driver = %driver.name(), uri, "Skipping set_acls, not implemented by store");
                Ok(())
            }
            Err(Error::NotFound(_)) => {
                warn!(driver = %driver.name(), uri, "Failed to set access controls, object not found");
                Ok(())
            }
            other => other,
        }
    }
}
