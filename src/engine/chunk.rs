//! Chunk sizing rules and chunk readers
//!
//! Chunk sizes are multiples of 256 KiB. With dynamic sizing enabled the size
//! doubles after a chunk that took less than 10 seconds and halves after one that
//! took more than 30 seconds, staying within [`MIN_CHUNK_SIZE`, `MAX_CHUNK_SIZE`].

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::types::FileSource;

/// Every chunk size must be a multiple of this: 256 KiB
pub const CHUNK_SIZE_GRANULARITY: u64 = 256 * 1024;

/// Smallest chunk dynamic sizing shrinks to: 256 KiB
pub const MIN_CHUNK_SIZE: u64 = CHUNK_SIZE_GRANULARITY;

/// Largest chunk size: 500 MiB
pub const MAX_CHUNK_SIZE: u64 = 500 * 1024 * 1024;

/// Chunk size when none is configured: 30 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 30 * 1024 * 1024;

/// Chunks faster than this grow the next chunk
pub const FAST_CHUNK_THRESHOLD: Duration = Duration::from_secs(10);

/// Chunks slower than this shrink the next chunk
pub const SLOW_CHUNK_THRESHOLD: Duration = Duration::from_secs(30);

/// Size of the next chunk after one of `current` bytes took `elapsed`
pub fn next_chunk_size(current: u64, elapsed: Duration) -> u64 {
    if elapsed < FAST_CHUNK_THRESHOLD {
        current.saturating_mul(2).min(MAX_CHUNK_SIZE)
    } else if elapsed > SLOW_CHUNK_THRESHOLD {
        (current / 2).max(MIN_CHUNK_SIZE)
    } else {
        current
    }
}

/// `Content-Range` header value for `len` bytes at `offset` of a `total`-byte file
pub fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// Reads consecutive chunks out of a [`FileSource`]
pub(crate) enum ChunkReader {
    /// Slices of an in-memory buffer
    Memory(Arc<Vec<u8>>),
    /// One handle read front to back
    Stream {
        /// Open handle
        file: File,
        /// Offset the handle is positioned at
        position: u64,
    },
    /// Reopen and seek for every chunk
    Seek(PathBuf),
}

impl ChunkReader {
    pub(crate) async fn open(source: &FileSource, reopen_per_chunk: bool) -> std::io::Result<Self> {
        match source {
            FileSource::Memory(data) => Ok(ChunkReader::Memory(Arc::clone(data))),
            FileSource::Path(path) if reopen_per_chunk => Ok(ChunkReader::Seek(path.clone())),
            FileSource::Path(path) => Ok(ChunkReader::Stream {
                file: File::open(path).await?,
                position: 0,
            }),
        }
    }

    pub(crate) async fn read_chunk(&mut self, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
        match self {
            ChunkReader::Memory(data) => {
                let start = usize::try_from(offset).map_err(std::io::Error::other)?;
                let end = usize::try_from(offset + len).map_err(std::io::Error::other)?;
                data.get(start..end).map(<[u8]>::to_vec).ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("chunk {}..{} is outside the {}-byte buffer", start, end, data.len()),
                    )
                })
            }
            ChunkReader::Stream { file, position } => {
                if *position != offset {
                    file.seek(SeekFrom::Start(offset)).await?;
                }
                let buf = read_exact_len(file, len).await?;
                *position = offset + len;
                Ok(buf)
            }
            ChunkReader::Seek(path) => {
                let mut file = File::open(&*path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                read_exact_len(&mut file, len).await
            }
        }
    }
}

async fn read_exact_len(file: &mut File, len: u64) -> std::io::Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(std::io::Error::other)?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}
