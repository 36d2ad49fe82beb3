//! Scheme registry: which driver serves which URI scheme.
//!
//! The registry is populated once at startup with [`Registry::load`] and
//! then shared read-only (typically as `Arc<Registry>`) with the
//! [`crate::Dispatcher`]. Because every mutating method takes `&mut self`,
//! a registry that is already shared cannot be changed underneath callers.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use stowage_common::{Error, Result};

use crate::catalog::DriverCatalog;
use crate::config::StoreConfig;
use crate::driver::Driver;
use crate::location::{is_valid_scheme, split_scheme, Location, LocationKind};

/// Registration of one scheme.
#[derive(Clone)]
pub struct SchemeRegistration {
    pub driver: Arc<dyn Driver>,
    pub kind: LocationKind,
}

impl fmt::Debug for SchemeRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistration")
            .field("driver", &self.driver.name())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Scheme to driver table.
#[derive(Default)]
pub struct Registry {
    schemes: HashMap<String, SchemeRegistration>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate, configure and register every driver named in `config`.
    ///
    /// Drivers that cannot be instantiated or configured are skipped with a
    /// warning.
    ///
    /// # Returns
    /// Number of drivers registered.
    ///
    /// # Errors
    /// - `Configuration` if a loaded driver reports no schemes
    pub fn load(&mut self, catalog: &DriverCatalog, config: &StoreConfig) -> Result<usize> {
        let mut count = 0;

        for name in config.enabled_stores() {
            debug!(driver = %name, "Attempting to load driver");

            let settings = config.driver_settings(&name);
            let mut driver = match catalog.instantiate(&name, &settings) {
                Ok(driver) => driver,
                Err(e) => {
                    warn!(driver = %name, error = %e, "Failed to load driver, it will be disabled");
                    continue;
                }
            };

            if let Err(e) = driver.configure() {
                warn!(driver = %name, error = %e, "Failed to configure driver, it will be disabled");
                continue;
            }

            self.register_driver(Arc::from(driver))?;
            count += 1;
        }

        info!(count, schemes = ?self.known_schemes(), "Loaded storage drivers");
        Ok(count)
    }

    /// Register every scheme of an already configured driver.
    ///
    /// # Errors
    /// - `Configuration` if the driver reports no schemes, or an invalid one
    pub fn register_driver(&mut self, driver: Arc<dyn Driver>) -> Result<()> {
        let schemes = driver.supported_schemes();
        if schemes.is_empty() {
            return Err(Error::Configuration(format!(
                "Unable to register driver '{}': no schemes associated with it",
                driver.name()
            )));
        }

        let kind = driver.location_kind();
        let mut scheme_map = HashMap::new();
        for scheme in schemes {
            if !is_valid_scheme(&scheme) {
                return Err(Error::Configuration(format!(
                    "Driver '{}' declares invalid scheme '{}'",
                    driver.name(),
                    scheme
                )));
            }
            scheme_map.insert(
                scheme,
                SchemeRegistration {
                    driver: Arc::clone(&driver),
                    kind,
                },
            );
        }

        debug!(driver = %driver.name(), schemes = ?scheme_map.keys().collect::<Vec<_>>(), "Registering driver");
        self.register(scheme_map);
        Ok(())
    }

    /// Merge scheme registrations into the table.
    ///
    /// A registration for a scheme that is already present replaces it.
    pub fn register(&mut self, scheme_map: HashMap<String, SchemeRegistration>) {
        for (scheme, registration) in scheme_map {
            let incoming = registration.driver.name().to_string();
            if let Some(previous) = self.schemes.insert(scheme.clone(), registration) {
                if !Arc::ptr_eq(&previous.driver, &self.schemes[&scheme].driver) {
                    warn!(
                        scheme = %scheme,
                        previous = %previous.driver.name(),
                        driver = %incoming,
                        "Scheme re-registered, replacing previous driver"
                    );
                }
            }
        }
    }

    /// Registration for `scheme`.
    ///
    /// # Errors
    /// - `UnknownScheme` if nothing is registered for it
    pub fn registration(&self, scheme: &str) -> Result<&SchemeRegistration> {
        self.schemes
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    /// Driver serving `scheme`. Always the same instance for a given scheme.
    ///
    /// # Errors
    /// - `UnknownScheme` if nothing is registered for it
    pub fn lookup(&self, scheme: &str) -> Result<Arc<dyn Driver>> {
        self.registration(scheme).map(|r| Arc::clone(&r.driver))
    }

    /// Check that the default scheme has a driver.
    ///
    /// # Errors
    /// - `Configuration` if it does not
    pub fn verify_default(&self, scheme: &str) -> Result<()> {
        match self.registration(scheme) {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::Configuration(format!(
                "Store for default scheme '{}' not found",
                scheme
            ))),
        }
    }

    /// All registered schemes.
    pub fn known_schemes(&self) -> BTreeSet<String> {
        self.schemes.keys().cloned().collect()
    }

    /// Number of registered schemes.
    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Decode a URI into a location of its registered driver.
    ///
    /// # Errors
    /// - `BadStoreUri` if the URI has no valid scheme, or its remainder does
    ///   not fit the driver's location kind
    /// - `UnknownScheme` if the scheme is not registered
    pub fn location_from_uri(&self, uri: &str) -> Result<Location> {
        let (scheme, remainder) = split_scheme(uri)?;
        let registration = self.registration(scheme)?;
        Location::new(
            registration.driver.name(),
            scheme,
            remainder,
            registration.kind,
        )
    }

    /// Scheme that would serve `uri`, without resolving the driver.
    ///
    /// # Errors
    /// - `BadStoreUri` / `UnknownScheme` as for [`Registry::location_from_uri`]
    pub fn store_name(&self, uri: &str) -> Result<String> {
        let (scheme, _) = split_scheme(uri)?;
        self.registration(scheme)?;
        Ok(scheme.to_string())
    }

    /// Decode `uri` and resolve the driver that serves it.
    pub fn resolve(&self, uri: &str) -> Result<(Location, Arc<dyn Driver>)> {
        let location = self.location_from_uri(uri)?;
        let driver = self.lookup(location.scheme())?;
        Ok((location, driver))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.known_schemes())
            .finish()
    }
}
