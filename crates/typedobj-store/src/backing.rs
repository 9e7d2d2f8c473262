//! Where payload bytes live, and the readers handed out over them.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::sync::Arc;

use crate::tempfiles::SpoolGuard;

/// Storage for a finished payload.
#[derive(Debug)]
pub(crate) enum Backing {
    Memory(Arc<[u8]>),
    Disk(SpoolGuard),
}

impl Backing {
    /// A fresh reader positioned at the first byte.
    pub(crate) fn reader(&self) -> std::io::Result<PayloadReader> {
        Ok(match self {
            Self::Memory(bytes) => PayloadReader::Memory(Cursor::new(Arc::clone(bytes))),
            Self::Disk(spool) => PayloadReader::File(BufReader::new(File::open(spool.path())?)),
        })
    }
}

/// Independent reader over stored payload bytes.
///
/// Memory readers share the buffer; file readers hold their own handle, so
/// any number may be open at once.
#[derive(Debug)]
pub enum PayloadReader {
    /// Bytes held in memory.
    Memory(Cursor<Arc<[u8]>>),
    /// Bytes in a spool file.
    File(BufReader<File>),
}

impl Read for PayloadReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Memory(c) => c.read(buf),
            Self::File(f) => f.read(buf),
        }
    }
}

impl BufRead for PayloadReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            Self::Memory(c) => c.fill_buf(),
            Self::File(f) => f.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Memory(c) => c.consume(amt),
            Self::File(f) => f.consume(amt),
        }
    }
}
