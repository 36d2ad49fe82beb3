//! Backend abstraction and dispatch for Stowage.
//!
//! This crate stores, retrieves, sizes, deletes and sets access controls on
//! large binary objects through pluggable drivers selected by URI scheme.
//!
//! # Components
//! - [`location`]: URI ⇄ [`Location`] codec
//! - [`chunked`]: one-pass sources readable by iteration or offset
//! - [`metadata`]: validation of driver-returned metadata
//! - [`driver`]: the [`Driver`] trait every backend implements
//! - [`catalog`]: driver name → factory
//! - [`registry`]: scheme → driver
//! - [`dispatch`]: the [`Dispatcher`] callers use
//!
//! Built-in drivers: [`FileDriver`] (`file:`) and [`MemoryDriver`] (`mem:`).
//!
//! # Example
//! ```no_run
//! use stowage_common::ObjectId;
//! use stowage_storage::{create_default_catalog, BytesSource, Dispatcher, StoreConfig};
//!
//! # async fn run() -> stowage_common::Result<()> {
//! let config = StoreConfig::default()
//!     .with_driver_settings("file", serde_json::json!({"datadir": "/var/lib/stowage"}));
//! let dispatcher = Dispatcher::from_config(&create_default_catalog(), &config)?;
//!
//! let id = ObjectId::new("image-01")?;
//! let stored = dispatcher.add(&id, BytesSource::new(&b"hello"[..]), 5, None).await?;
//! assert!(stored.uri.starts_with("file:"));
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod chunked;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod driver;
pub mod local;
pub mod location;
pub mod memory;
pub mod metadata;
pub mod registry;

pub use catalog::{create_default_catalog, DriverCatalog, DriverFactory};
pub use chunked::{BytesSource, ChunkSource, DataSource, Indexable, ReaderSource, StreamSource};
pub use config::StoreConfig;
pub use dispatch::Dispatcher;
pub use driver::{
    AccessControl, ByteStream, Capabilities, Driver, RequestContext, StoredObject,
};
pub use local::FileDriver;
pub use location::{split_scheme, Location, LocationKind};
pub use memory::MemoryDriver;
pub use registry::{Registry, SchemeRegistration};
