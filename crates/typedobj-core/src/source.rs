//! # JSON Sources
//!
//! A [`JsonSource`] is the backing data for a document: an in-memory string,
//! a byte buffer, or a file. It is the only way to obtain a
//! [`TokenStream`], and every call opens a fresh, independently positioned
//! stream. Re-scanning a document therefore means re-opening its source,
//! never rewinding or sharing a cursor.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::TokenError;
use crate::stream::TokenStream;

/// Backing data for a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonSource {
    /// UTF-8 text held in memory.
    Text(String),
    /// Raw bytes held in memory.
    Bytes(Vec<u8>),
    /// A file on disk, read lazily.
    File(PathBuf),
}

impl JsonSource {
    /// Source backed by a file path.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Open a reader positioned at the first byte.
    pub fn reader(&self) -> std::io::Result<SourceReader<'_>> {
        Ok(match self {
            Self::Text(s) => SourceReader::Memory(s.as_bytes()),
            Self::Bytes(b) => SourceReader::Memory(b.as_slice()),
            Self::File(p) => SourceReader::File(BufReader::new(File::open(p)?)),
        })
    }

    /// Open a fresh token stream over the whole document.
    pub fn open(&self) -> Result<TokenStream<SourceReader<'_>>, TokenError> {
        Ok(TokenStream::new(self.reader()?))
    }

    /// Open a fresh token stream over the subtree at `root`.
    pub fn open_at(&self, root: &str) -> Result<TokenStream<SourceReader<'_>>, TokenError> {
        TokenStream::with_root(self.reader()?, root)
    }

    /// Length of the backing data in bytes.
    pub fn len(&self) -> std::io::Result<u64> {
        Ok(match self {
            Self::Text(s) => s.len() as u64,
            Self::Bytes(b) => b.len() as u64,
            Self::File(p) => std::fs::metadata(p)?.len(),
        })
    }

    /// Whether the backing data is empty.
    pub fn is_empty(&self) -> std::io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl From<String> for JsonSource {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for JsonSource {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for JsonSource {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Buffered reader over any [`JsonSource`] variant.
pub enum SourceReader<'a> {
    /// In-memory bytes.
    Memory(&'a [u8]),
    /// Buffered file.
    File(BufReader<File>),
}

impl Read for SourceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Memory(m) => m.read(buf),
            Self::File(f) => f.read(buf),
        }
    }
}

impl BufRead for SourceReader<'_> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            Self::Memory(m) => Ok(*m),
            Self::File(f) => f.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Memory(m) => m.consume(amt),
            Self::File(f) => f.consume(amt),
        }
    }
}
