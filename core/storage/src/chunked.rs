//! Chunked access to one-pass data sources.
//!
//! Callers hand image data to [`crate::Dispatcher::add`] as a one-pass
//! source: an HTTP body, an open file, another store's `get` stream. Some
//! driver code iterates over chunks, other code addresses data by offset.
//! [`Indexable`] serves both from the same source without ever holding more
//! than one chunk in memory.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use stowage_common::{Error, Result};

use crate::driver::ByteStream;

/// Default chunk size for reader-backed sources (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A one-pass producer of byte chunks.
///
/// `next_chunk` is the seam [`Indexable`] pulls data through; implement it
/// to adapt any transport.
#[async_trait]
pub trait ChunkSource: Send {
    /// Produce the next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Total length of the source, if it knows it up front.
    fn len_hint(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
impl<T: ChunkSource + ?Sized> ChunkSource for Box<T> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        (**self).next_chunk().await
    }

    fn len_hint(&self) -> Option<u64> {
        (**self).len_hint()
    }
}

/// Source backed by a stream of chunks.
pub struct StreamSource<S> {
    stream: S,
    len: Option<u64>,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream, len: None }
    }

    /// Attach a known total length.
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }
}

#[async_trait]
impl<S> ChunkSource for StreamSource<S>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.stream.next().await.transpose()
    }

    fn len_hint(&self) -> Option<u64> {
        self.len
    }
}

/// Source backed by a file-like async reader.
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    len: Option<u64>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Send + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            len: None,
        }
    }

    /// Set custom chunk size. Zero falls back to the default.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = if size == 0 { DEFAULT_CHUNK_SIZE } else { size };
        self
    }

    /// Attach a known total length (e.g. from file metadata).
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }
}

#[async_trait]
impl<R> ChunkSource for ReaderSource<R>
where
    R: AsyncRead + Send + Unpin,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut buffer = vec![0u8; self.chunk_size];
        let bytes_read = self.reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        buffer.truncate(bytes_read);
        Ok(Some(Bytes::from(buffer)))
    }

    fn len_hint(&self) -> Option<u64> {
        self.len
    }
}

/// Source over an in-memory buffer.
pub struct BytesSource {
    remaining: Bytes,
    chunk_size: usize,
    len: u64,
}

impl BytesSource {
    /// Serve `data` as a single chunk.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let remaining = data.into();
        Self {
            len: remaining.len() as u64,
            chunk_size: usize::MAX,
            remaining,
        }
    }

    /// Serve `data` in chunks of at most `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

#[async_trait]
impl ChunkSource for BytesSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_size.min(self.remaining.len());
        Ok(Some(self.remaining.split_to(take)))
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// A one-pass source with a declared size, readable by iteration or by
/// forward offsets.
///
/// The most recently produced chunk is cached. Asking for an offset inside
/// that chunk returns its tail; asking for any later offset pulls the next
/// chunk from the source and returns it whole.
///
/// Single consumer, forward only.
pub struct Indexable<S> {
    source: S,
    size: u64,
    cursor: u64,
    chunk: Option<Bytes>,
}

impl<S: ChunkSource> Indexable<S> {
    /// Wrap `source`.
    ///
    /// A zero `declared_size` falls back to the source's length hint, and
    /// to zero (unknown) when it has none.
    pub fn new(source: S, declared_size: u64) -> Self {
        let size = if declared_size > 0 {
            declared_size
        } else {
            source.len_hint().unwrap_or(0)
        };
        Self {
            source,
            size,
            cursor: 0,
            chunk: None,
        }
    }

    async fn fetch(&mut self) -> Result<Option<Bytes>> {
        let next = self.source.next_chunk().await?;
        if let Some(chunk) = &next {
            self.cursor += chunk.len() as u64;
            self.chunk = Some(chunk.clone());
        }
        Ok(next)
    }

    /// Next chunk in iteration order, or `None` at the end.
    pub async fn next(&mut self) -> Result<Option<Bytes>> {
        self.fetch().await
    }

    /// Data starting at `start`.
    ///
    /// # Errors
    /// - `InvalidInput` if `start` lies before the cached chunk
    /// - Any error the source produces
    pub async fn chunk_at(&mut self, start: u64) -> Result<Option<Bytes>> {
        if start < self.cursor {
            let chunk = self.chunk.as_ref().ok_or_else(|| {
                Error::InvalidInput(format!("offset {} is no longer buffered", start))
            })?;
            let back = usize::try_from(self.cursor - start)
                .ok()
                .filter(|back| *back <= chunk.len())
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "offset {} precedes the buffered chunk (cursor at {})",
                        start, self.cursor
                    ))
                })?;
            return Ok(Some(chunk.slice(chunk.len() - back..)));
        }

        self.fetch().await
    }

    /// Declared size of the data; zero when unknown.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Bytes produced by the source so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl<S: ChunkSource + 'static> Indexable<S> {
    /// Convert into a stream of chunks. The stream ends after the first
    /// error.
    pub fn into_stream(self) -> ByteStream {
        let stream = futures::stream::unfold(Some(self), |state| async move {
            let mut indexable = state?;
            match indexable.next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(indexable))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });
        Box::pin(stream)
    }
}

/// The adapter type drivers receive from [`crate::Dispatcher::add`].
pub type DataSource = Indexable<Box<dyn ChunkSource>>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn two_chunks() -> StreamSource<impl Stream<Item = Result<Bytes>> + Send + Unpin> {
        StreamSource::new(stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]))
    }

    #[tokio::test]
    async fn test_iteration_yields_chunks_in_order() {
        let mut data = Indexable::new(two_chunks(), 4);
        assert_eq!(data.len(), 4);
        assert_eq!(data.next().await.unwrap().unwrap(), "ab");
        assert_eq!(data.next().await.unwrap().unwrap(), "cd");
        assert!(data.next().await.unwrap().is_none());
        assert_eq!(data.cursor(), 4);
    }

    #[tokio::test]
    async fn test_indexing_serves_cached_then_next_chunk() {
        let mut data = Indexable::new(two_chunks(), 4);
        assert_eq!(data.chunk_at(0).await.unwrap().unwrap(), "ab");
        // Offset 0 is still inside the cached chunk.
        assert_eq!(data.chunk_at(0).await.unwrap().unwrap(), "ab");
        assert_eq!(data.chunk_at(1).await.unwrap().unwrap(), "b");
        assert_eq!(data.chunk_at(2).await.unwrap().unwrap(), "cd");
        assert!(data.chunk_at(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_indexing_after_iteration() {
        let mut data = Indexable::new(two_chunks(), 4);
        assert_eq!(data.next().await.unwrap().unwrap(), "ab");
        assert_eq!(data.chunk_at(0).await.unwrap().unwrap(), "ab");
        assert_eq!(data.chunk_at(2).await.unwrap().unwrap(), "cd");
    }

    #[tokio::test]
    async fn test_backward_beyond_cache_fails() {
        let mut data = Indexable::new(two_chunks(), 4);
        data.next().await.unwrap();
        data.next().await.unwrap();
        assert!(matches!(data.chunk_at(0).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_backward_access_bounded_by_cached_chunk() {
        let source = BytesSource::new(&b"abcdefgh"[..]).with_chunk_size(3);
        let mut data = Indexable::new(source, 8);
        data.next().await.unwrap();
        assert_eq!(data.chunk_at(3).await.unwrap().unwrap(), "def");
        // Cached chunk covers offsets 3..6.
        assert_eq!(data.chunk_at(3).await.unwrap().unwrap(), "def");
        assert_eq!(data.chunk_at(5).await.unwrap().unwrap(), "f");
        assert!(matches!(data.chunk_at(2).await, Err(Error::InvalidInput(_))));
        assert!(matches!(data.chunk_at(0).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_size_falls_back_to_hint() {
        let data = Indexable::new(BytesSource::new(&b"hello"[..]), 0);
        assert_eq!(data.len(), 5);

        let data = Indexable::new(two_chunks(), 0);
        assert_eq!(data.len(), 0);
        assert!(data.is_empty());

        let data = Indexable::new(two_chunks().with_len(4), 0);
        assert_eq!(data.len(), 4);
    }

    #[tokio::test]
    async fn test_bytes_source_chunking() {
        let mut source = BytesSource::new(&b"abcde"[..]).with_chunk_size(2);
        assert_eq!(source.next_chunk().await.unwrap().unwrap(), "ab");
        assert_eq!(source.next_chunk().await.unwrap().unwrap(), "cd");
        assert_eq!(source.next_chunk().await.unwrap().unwrap(), "e");
        assert!(source.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_source() {
        let reader = std::io::Cursor::new(b"0123456789".to_vec());
        let source = ReaderSource::new(reader).with_chunk_size(4).with_len(10);
        let source: Box<dyn ChunkSource> = Box::new(source);
        let mut data: DataSource = Indexable::new(source, 0);
        assert_eq!(data.len(), 10);

        let mut collected = Vec::new();
        while let Some(chunk) = data.next().await.unwrap() {
            assert!(chunk.len() <= 4);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"0123456789");
    }

    #[tokio::test]
    async fn test_into_stream_stops_after_error() {
        let source = StreamSource::new(stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::Backend("connection reset".to_string())),
            Ok(Bytes::from_static(b"cd")),
        ]));
        let results: Vec<_> = Indexable::new(source, 0).into_stream().collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Backend(_))));
    }
}
