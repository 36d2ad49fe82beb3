//! Local filesystem storage driver.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use stowage_common::{Error, ObjectId, Result};

use crate::chunked::{DataSource, DEFAULT_CHUNK_SIZE};
use crate::digest::Checksum;
use crate::driver::{ByteStream, Capabilities, Driver, RequestContext, StoredObject};
use crate::location::{Location, LocationKind};

/// Scheme served by the filesystem driver.
pub const FILE_SCHEME: &str = "file";

/// Settings accepted by the `file` driver factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    /// Directory objects are written to.
    pub datadir: PathBuf,
    /// Chunk size used by `get` when the caller gives none.
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

/// Local filesystem storage driver.
///
/// Stores each object as one file named after its id inside a data
/// directory. Supports delete; has no notion of access control.
pub struct FileDriver {
    datadir: PathBuf,
    chunk_size: usize,
}

impl FileDriver {
    /// Create a driver rooted at `datadir`.
    ///
    /// The directory is created and resolved by [`Driver::configure`].
    pub fn new(datadir: impl AsRef<Path>) -> Self {
        Self {
            datadir: datadir.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build a driver from factory settings.
    ///
    /// # Errors
    /// - `Configuration` if `datadir` is missing or settings are malformed
    pub fn from_settings(settings: &Value) -> Result<Self> {
        let settings: FileSettings = serde_json::from_value(settings.clone()).map_err(|e| {
            Error::Configuration(format!("file driver requires a 'datadir' setting: {}", e))
        })?;
        let mut driver = Self::new(settings.datadir);
        if let Some(chunk_size) = settings.chunk_size.filter(|c| *c > 0) {
            driver.chunk_size = chunk_size;
        }
        Ok(driver)
    }

    /// Data directory objects are stored in.
    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Map a location to a file inside the data directory.
    fn resolve(&self, location: &Location) -> Result<PathBuf> {
        let path = location
            .path()
            .ok_or_else(|| Error::BadStoreUri(format!("not a path location: {}", location)))?;

        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir));
        if escapes || !path.starts_with(&self.datadir) {
            return Err(Error::BadStoreUri(format!(
                "{} is outside the data directory {}",
                location,
                self.datadir.display()
            )));
        }

        Ok(path.to_path_buf())
    }

    async fn write_object(&self, path: &Path, data: &mut DataSource) -> Result<Checksum> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::AlreadyExists(format!("Image file {} already exists", path.display()))
                }
                _ => Error::from(e),
            })?;

        let mut checksum = Checksum::new();
        let written = async {
            while let Some(chunk) = data.next().await? {
                checksum.update(&chunk);
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %cleanup, "Failed to remove partial image file");
            }
            return Err(e);
        }

        Ok(checksum)
    }
}

#[async_trait]
impl Driver for FileDriver {
    fn name(&self) -> &str {
        "file"
    }

    fn configure(&mut self) -> Result<()> {
        if !self.datadir.exists() {
            std::fs::create_dir_all(&self.datadir)?;
        }
        if !self.datadir.is_dir() {
            return Err(Error::Configuration(format!(
                "datadir {} is not a directory",
                self.datadir.display()
            )));
        }
        self.datadir = std::fs::canonicalize(&self.datadir)?;
        debug!(datadir = %self.datadir.display(), "Configured file driver");
        Ok(())
    }

    fn supported_schemes(&self) -> BTreeSet<String> {
        BTreeSet::from([FILE_SCHEME.to_string()])
    }

    fn location_kind(&self) -> LocationKind {
        LocationKind::Path
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            delete: true,
            set_acls: false,
        }
    }

    async fn add(
        &self,
        object_id: &ObjectId,
        mut data: DataSource,
        size: u64,
    ) -> Result<StoredObject> {
        let path = self.datadir.join(object_id.as_str());
        let location = Location::for_path(self.name(), FILE_SCHEME, &path)?;

        let checksum = self.write_object(&path, &mut data).await?;
        let written = checksum.bytes();
        if size > 0 && written != size {
            debug!(uri = %location, declared = size, written, "Declared size differs from bytes written");
        }

        Ok(StoredObject {
            uri: location.uri(),
            size: written,
            checksum: checksum.finalize_hex(),
            metadata: None,
        })
    }

    async fn get(
        &self,
        location: &Location,
        offset: u64,
        chunk_size: Option<usize>,
        _context: &RequestContext,
    ) -> Result<ByteStream> {
        let path = self.resolve(location)?;
        let mut file = fs::File::open(&path).await?;

        let len = file.metadata().await?.len();
        if offset > len {
            return Err(Error::InvalidInput(format!(
                "offset {} is past the end of {} ({} bytes)",
                offset, location, len
            )));
        }
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }

        let capacity = chunk_size.filter(|c| *c > 0).unwrap_or(self.chunk_size);
        let stream = ReaderStream::with_capacity(file, capacity)
            .map(|chunk| chunk.map_err(Error::from));
        Ok(Box::pin(stream))
    }

    async fn get_size(&self, location: &Location, _context: &RequestContext) -> Result<u64> {
        let path = self.resolve(location)?;
        let metadata = fs::metadata(&path).await?;
        if metadata.is_dir() {
            return Err(Error::InvalidInput(format!("{} is a directory", location)));
        }
        Ok(metadata.len())
    }

    async fn delete(&self, location: &Location, _context: &RequestContext) -> Result<()> {
        let path = self.resolve(location)?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("Image file {} not found", path.display()))
            }
            _ => Error::from(e),
        })?;
        debug!(uri = %location, "Deleted image file");
        Ok(())
    }
}
