//! Driver catalog: maps driver names to factories.

use std::collections::HashMap;
use serde_json::Value;

use stowage_common::{Error, Result};
use crate::driver::Driver;
use crate::local::FileDriver;
use crate::memory::MemoryDriver;

/// Factory function type for creating drivers from their settings.
pub type DriverFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Driver>> + Send + Sync>;

/// Catalog of driver factories.
///
/// The names listed in the `stores` configuration are resolved here.
/// Built-in drivers come from [`create_default_catalog`]; external ones are
/// added with [`DriverCatalog::register`].
pub struct DriverCatalog {
    factories: HashMap<String, DriverFactory>,
}

impl DriverCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory.
    ///
    /// # Preconditions
    /// - `name` must be unique within the catalog
    ///
    /// # Errors
    /// - Returns `AlreadyExists` if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Driver '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Create an unconfigured driver instance.
    ///
    /// # Errors
    /// - `Configuration` if no factory is registered under `name`
    /// - Whatever the factory reports for invalid settings
    pub fn instantiate(&self, name: &str, settings: &Value) -> Result<Box<dyn Driver>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::Configuration(format!("Driver '{}' is not available", name))
        })?;
        factory(settings)
    }

    /// Get sorted list of registered driver names.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a driver is registered.
    pub fn has_driver(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for DriverCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a catalog with the built-in drivers.
///
/// - `file`: requires a `datadir` setting
/// - `memory`: ignores its settings
pub fn create_default_catalog() -> DriverCatalog {
    let mut catalog = DriverCatalog::new();

    let file: DriverFactory =
        Box::new(|settings| Ok(Box::new(FileDriver::from_settings(settings)?)));
    let memory: DriverFactory = Box::new(|_settings| Ok(Box::new(MemoryDriver::new())));

    catalog.factories.insert("file".to_string(), file);
    catalog.factories.insert("memory".to_string(), memory);

    catalog
}
