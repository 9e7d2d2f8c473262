//! # Content Digest — MD5 over Canonical Bytes
//!
//! Typed objects are content-addressed by the MD5 of their canonical
//! (sorted-key) encoding. [`Md5Digest`] is the digest value;
//! [`HashingWriter`] computes it incrementally while canonical bytes are
//! written to their final destination, so the payload is never re-read just
//! to hash it.

use std::io::Write;

use serde::{Deserialize, Serialize};

/// A 16-byte MD5 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Md5Digest {
    bytes: [u8; 16],
}

impl Md5Digest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Digest of an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self::new(md5::compute(data).0)
    }

    /// Parse a 32-character lowercase or uppercase hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self { bytes })
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Writer adapter that hashes and counts every byte passed through.
pub struct HashingWriter<W> {
    inner: W,
    context: md5::Context,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    /// Hash bytes on their way to `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            context: md5::Context::new(),
            written: 0,
        }
    }

    /// Flush and return the inner writer, the digest and the byte count.
    pub fn finish(mut self) -> std::io::Result<(W, Md5Digest, u64)> {
        self.inner.flush()?;
        let digest = Md5Digest::new(self.context.compute().0);
        Ok((self.inner, digest, self.written))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.context.consume(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
