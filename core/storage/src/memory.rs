//! In-memory storage driver for testing.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

use stowage_common::{Error, ObjectId, Result};

use crate::chunked::DataSource;
use crate::digest::Checksum;
use crate::driver::{
    AccessControl, ByteStream, Capabilities, Driver, RequestContext, StoredObject,
};
use crate::location::{Location, LocationKind};

/// Scheme served by the memory driver unless configured otherwise.
pub const MEMORY_SCHEME: &str = "mem";

/// In-memory storage entry.
#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    checksum: String,
    stored_at: DateTime<Utc>,
    access: AccessControl,
}

/// In-memory storage driver.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Supports every optional operation.
pub struct MemoryDriver {
    name: String,
    schemes: BTreeSet<String>,
    storage: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryDriver {
    /// Create a new empty memory driver serving `mem:`.
    pub fn new() -> Self {
        Self::with_schemes("memory", [MEMORY_SCHEME])
    }

    /// Create a memory driver with a custom name and scheme set.
    pub fn with_schemes<I, S>(name: impl Into<String>, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            schemes: schemes.into_iter().map(Into::into).collect(),
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn key<'a>(location: &'a Location) -> Result<&'a str> {
        location
            .key()
            .ok_or_else(|| Error::BadStoreUri(format!("not a keyed location: {}", location)))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.storage
            .read()
            .map_err(|_| Error::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.storage
            .write()
            .map_err(|_| Error::Backend("memory store lock poisoned".to_string()))
    }

    fn entry(&self, location: &Location) -> Result<Entry> {
        let key = Self::key(location)?;
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", location)))
    }

    /// Access policy currently applied to `location`.
    pub fn access(&self, location: &Location) -> Result<AccessControl> {
        Ok(self.entry(location)?.access)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_schemes(&self) -> BTreeSet<String> {
        self.schemes.clone()
    }

    fn location_kind(&self) -> LocationKind {
        LocationKind::Key
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn add(
        &self,
        object_id: &ObjectId,
        mut data: DataSource,
        _size: u64,
    ) -> Result<StoredObject> {
        let scheme = self
            .schemes
            .iter()
            .next()
            .ok_or_else(|| Error::Configuration(format!("driver '{}' has no scheme", self.name)))?;
        let location = Location::for_key(&self.name, scheme.as_str(), object_id.as_str())?;

        if self.read()?.contains_key(object_id.as_str()) {
            return Err(Error::AlreadyExists(format!("Object already exists: {}", location)));
        }

        let mut buffer = BytesMut::new();
        let mut checksum = Checksum::new();
        while let Some(chunk) = data.next().await? {
            checksum.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }

        let size = checksum.bytes();
        let entry = Entry {
            data: buffer.freeze(),
            checksum: checksum.finalize_hex(),
            stored_at: Utc::now(),
            access: AccessControl::default(),
        };

        let stored = StoredObject {
            uri: location.uri(),
            size,
            checksum: entry.checksum.clone(),
            metadata: Some(serde_json::json!({
                "stored_at": entry.stored_at.to_rfc3339(),
            })),
        };

        {
            let mut storage = self.write()?;
            if storage.contains_key(object_id.as_str()) {
                return Err(Error::AlreadyExists(format!(
                    "Object already exists: {}",
                    location
                )));
            }
            storage.insert(object_id.as_str().to_string(), entry);
        }

        debug!(uri = %stored.uri, size, "Stored object in memory");
        Ok(stored)
    }

    async fn get(
        &self,
        location: &Location,
        offset: u64,
        chunk_size: Option<usize>,
        _context: &RequestContext,
    ) -> Result<ByteStream> {
        let data = self.entry(location)?.data;
        let offset = usize::try_from(offset)
            .ok()
            .filter(|o| *o <= data.len())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "offset {} is past the end of {} ({} bytes)",
                    offset,
                    location,
                    data.len()
                ))
            })?;

        let remaining = data.slice(offset..);
        let chunk_size = chunk_size.filter(|c| *c > 0).unwrap_or(remaining.len().max(1));
        let chunks: Vec<Result<Bytes>> = (0..remaining.len())
            .step_by(chunk_size)
            .map(|start| Ok(remaining.slice(start..(start + chunk_size).min(remaining.len()))))
            .collect();

        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn get_size(&self, location: &Location, _context: &RequestContext) -> Result<u64> {
        Ok(self.entry(location)?.data.len() as u64)
    }

    async fn delete(&self, location: &Location, _context: &RequestContext) -> Result<()> {
        let key = Self::key(location)?;
        match self.write()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("Object not found: {}", location))),
        }
    }

    async fn set_acls(&self, location: &Location, access: &AccessControl) -> Result<()> {
        let key = Self::key(location)?;
        let mut storage = self.write()?;
        let entry = storage
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", location)))?;
        entry.access = access.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::{BytesSource, ChunkSource, Indexable};
    use crate::digest::checksum_hex;
    use futures::StreamExt;

    fn source(data: &'static [u8]) -> DataSource {
        let source: Box<dyn ChunkSource> = Box::new(BytesSource::new(data).with_chunk_size(3));
        Indexable::new(source, 0)
    }

    fn location(key: &str) -> Location {
        Location::for_key("memory", MEMORY_SCHEME, key).unwrap()
    }

    async fn read_all(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        chunks.concat()
    }

    #[tokio::test]
    async fn test_add_get() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("image-01").unwrap();
        let data = b"Hello, World!";

        let stored = driver.add(&id, source(data), 0).await.unwrap();
        assert_eq!(stored.uri, "mem://image-01");
        assert_eq!(stored.size, data.len() as u64);
        assert_eq!(stored.checksum, checksum_hex(data));

        let ctx = RequestContext::new();
        let stream = driver.get(&location("image-01"), 0, None, &ctx).await.unwrap();
        assert_eq!(read_all(stream).await, data);
    }

    #[tokio::test]
    async fn test_get_with_offset_and_chunk_size() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("img").unwrap();
        driver.add(&id, source(b"0123456789"), 10).await.unwrap();

        let ctx = RequestContext::new();
        let chunks: Vec<Bytes> = driver
            .get(&location("img"), 4, Some(4), &ctx)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![Bytes::from_static(b"4567"), Bytes::from_static(b"89")]);

        let past_end = driver.get(&location("img"), 11, None, &ctx).await;
        assert!(matches!(past_end, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_duplicate_add_fails() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("dup").unwrap();
        driver.add(&id, source(b"a"), 1).await.unwrap();
        let result = driver.add(&id, source(b"b"), 1).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_size_and_delete() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("sized").unwrap();
        driver.add(&id, source(b"abcdef"), 6).await.unwrap();

        let ctx = RequestContext::new();
        assert_eq!(driver.get_size(&location("sized"), &ctx).await.unwrap(), 6);

        driver.delete(&location("sized"), &ctx).await.unwrap();
        assert!(driver.is_empty());
        assert!(matches!(
            driver.get_size(&location("sized"), &ctx).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            driver.delete(&location("sized"), &ctx).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_acls() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("shared").unwrap();
        driver.add(&id, source(b"x"), 1).await.unwrap();

        let access = AccessControl {
            public: false,
            read_principals: vec!["tenant-a".to_string()],
            write_principals: vec!["tenant-b".to_string()],
        };
        driver.set_acls(&location("shared"), &access).await.unwrap();
        assert_eq!(driver.access(&location("shared")).unwrap(), access);

        let missing = driver.set_acls(&location("nope"), &access).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_object() {
        let driver = MemoryDriver::new();
        let id = ObjectId::new("empty").unwrap();
        let stored = driver.add(&id, source(b""), 0).await.unwrap();
        assert_eq!(stored.size, 0);

        let ctx = RequestContext::new();
        let stream = driver.get(&location("empty"), 0, None, &ctx).await.unwrap();
        assert!(read_all(stream).await.is_empty());
    }
}
