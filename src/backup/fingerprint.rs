//! Content fingerprints for change detection
//!
//! Digests are MD5 rendered as lowercase hex. They only need to be stable,
//! not collision resistant, and MD5 keeps them comparable with hashes
//! already stored in existing indexes.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{SnapKeepError, SnapKeepResult};

/// Bytes read per chunk while hashing
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Incremental digest over a byte stream
pub struct ContentHasher {
    context: md5::Context,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            context: md5::Context::new(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Finish and return the hex digest
    pub fn finish(self) -> String {
        format!("{:x}", self.context.compute())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader adapter that hashes everything read through it
pub struct HashingReader<R> {
    inner: R,
    hasher: ContentHasher,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Digest and byte count of everything read so far
    pub fn finish(self) -> (String, u64) {
        let bytes = self.hasher.bytes();
        (self.hasher.finish(), bytes)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Hash an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// Hash a file, streaming it in bounded chunks
pub fn hash_file(path: &Path) -> SnapKeepResult<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SnapKeepError::file_not_found(path),
        _ => SnapKeepError::Io(format!("Failed to open {}: {}", path.display(), e)),
    })?;

    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| SnapKeepError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finish())
}
