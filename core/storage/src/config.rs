//! Store configuration.
//!
//! The core consumes three things: which drivers to load, which scheme
//! `add` uses when the caller names none, and free-form per-driver settings
//! handed to each driver's factory.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stowage_common::{Error, Result};

fn default_stores() -> Vec<String> {
    vec!["file".to_string(), "memory".to_string()]
}

fn default_store() -> String {
    "file".to_string()
}

/// Store configuration, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Driver names to load, in order.
    #[serde(default = "default_stores")]
    pub stores: Vec<String>,
    /// Scheme used by `add` when none is given.
    #[serde(default = "default_store")]
    pub default_store: String,
    /// Driver-specific settings, keyed by driver name.
    #[serde(default)]
    pub drivers: HashMap<String, Value>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stores: default_stores(),
            default_store: default_store(),
            drivers: HashMap::new(),
        }
    }
}

impl StoreConfig {
    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid store configuration: {}", e)))
    }

    /// Read configuration from a JSON file.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - `Configuration` if it cannot be parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&json)
    }

    /// Driver names to load, in configured order with duplicates removed.
    pub fn enabled_stores(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.stores
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Settings for one driver; `Value::Null` when none are configured.
    pub fn driver_settings(&self, name: &str) -> Value {
        self.drivers.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Set the settings for one driver.
    pub fn with_driver_settings(mut self, name: impl Into<String>, settings: Value) -> Self {
        self.drivers.insert(name.into(), settings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.enabled_stores(), vec!["file", "memory"]);
        assert_eq!(config.default_store, "file");
    }

    #[test]
    fn test_enabled_stores_dedup_keeps_order() {
        let config = StoreConfig {
            stores: vec![
                "memory".into(),
                "file".into(),
                " memory ".into(),
                "".into(),
                "file".into(),
            ],
            ..StoreConfig::default()
        };
        assert_eq!(config.enabled_stores(), vec!["memory", "file"]);
    }

    #[test]
    fn test_driver_settings() {
        let config = StoreConfig::from_json(
            r#"{"stores": ["file"], "drivers": {"file": {"datadir": "/srv/images"}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.driver_settings("file"),
            json!({"datadir": "/srv/images"})
        );
        assert_eq!(config.driver_settings("memory"), Value::Null);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            StoreConfig::from_json("{\"stores\": 5}"),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("stowage.json");
        tokio::fs::write(&path, r#"{"default_store": "mem"}"#)
            .await
            .unwrap();

        let config = StoreConfig::load(&path).await.unwrap();
        assert_eq!(config.default_store, "mem");

        let missing = StoreConfig::load(temp.path().join("absent.json")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
