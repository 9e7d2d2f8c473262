//! # Payload Cache Manager
//!
//! [`PayloadManager`] stores incoming documents verbatim and hands them out
//! as [`CachedPayload`]s. Whether bytes go to memory or to a spool file is
//! fixed per manager: it spools exactly when it was built with a
//! [`TempFilesManager`].
//!
//! Subsets of a stored payload are produced by streaming the parent through
//! the subdata extractor (or positioning a token stream at a root path) and
//! storing the result as a new payload. A subset keeps a handle on its
//! parent; destroying the subset destroys the parent too.
//!
//! Every operation that fails after creating a spool file deletes that file
//! before returning. A [`FaultHook`] can force failures at fixed points to
//! verify this.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use typedobj_core::{JsonWriter, TokenSource, TokenStream};

use crate::backing::{Backing, PayloadReader};
use crate::error::{PayloadError, PayloadStateError};
use crate::fault::{FaultHook, FaultPoint};
use crate::subdata::{copy_value, extract, SubsetSelection};
use crate::tempfiles::TempFilesManager;

const SPOOL_PREFIX: &str = "payloadcache";
const SPOOL_EXTENSION: &str = "json";
const COPY_CHUNK: usize = 64 * 1024;

/// Creates and subsets cached payloads.
#[derive(Clone, Default)]
pub struct PayloadManager {
    temp_files: Option<Arc<TempFilesManager>>,
    fault_hook: Option<Arc<dyn FaultHook>>,
}

impl fmt::Debug for PayloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadManager")
            .field("temp_files", &self.temp_files)
            .field("fault_hook", &self.fault_hook.is_some())
            .finish()
    }
}

impl PayloadManager {
    /// Spool to `temp_files` when given, otherwise keep payloads in memory.
    pub fn new(temp_files: Option<Arc<TempFilesManager>>) -> Self {
        Self {
            temp_files,
            fault_hook: None,
        }
    }

    /// Install a fault hook.
    pub fn with_fault_hook(mut self, hook: Arc<dyn FaultHook>) -> Self {
        self.fault_hook = Some(hook);
        self
    }

    /// Whether payloads are spooled to disk.
    pub fn is_storing_on_disk(&self) -> bool {
        self.temp_files.is_some()
    }

    /// The spool file manager, if any.
    pub fn temp_files(&self) -> Option<&Arc<TempFilesManager>> {
        self.temp_files.as_ref()
    }

    fn check(&self, point: FaultPoint) -> std::io::Result<()> {
        match &self.fault_hook {
            Some(hook) => hook.check(point),
            None => Ok(()),
        }
    }

    /// Store whatever `write` produces as a new payload.
    fn store<F>(
        &self,
        trusted: bool,
        sorted: bool,
        parent: Option<CachedPayload>,
        write: F,
    ) -> Result<CachedPayload, PayloadError>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), PayloadError>,
    {
        let (backing, size) = match &self.temp_files {
            None => {
                let mut buf = Vec::new();
                write(&mut buf)?;
                let size = buf.len() as u64;
                (Backing::Memory(buf.into()), size)
            }
            Some(tfm) => {
                let spool = tfm.generate_temp_file(SPOOL_PREFIX, SPOOL_EXTENSION)?;
                self.check(FaultPoint::AfterSpoolCreated)?;
                let mut out = BufWriter::new(File::create(spool.path())?);
                write(&mut out)?;
                out.flush()?;
                drop(out);
                let size = std::fs::metadata(spool.path())?.len();
                (Backing::Disk(spool), size)
            }
        };
        tracing::debug!(size, on_disk = self.is_storing_on_disk(), "payload cached");
        Ok(CachedPayload {
            inner: Arc::new(PayloadInner {
                backing: Mutex::new(Some(backing)),
                size,
                trusted,
                sorted,
                parent,
            }),
        })
    }

    /// Store `input` byte for byte.
    ///
    /// `trusted` and `sorted` are carried as given: the caller vouches for
    /// them.
    pub fn create<R: Read>(
        &self,
        mut input: R,
        trusted: bool,
        sorted: bool,
    ) -> Result<CachedPayload, PayloadError> {
        self.store(trusted, sorted, None, |out| {
            let mut chunk = vec![0u8; COPY_CHUNK];
            loop {
                let n = match input.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                self.check(FaultPoint::DuringCopy)?;
                out.write_all(&chunk[..n])?;
            }
        })
    }

    /// A new payload holding the parts of `parent` chosen by `selection`.
    ///
    /// The subset inherits the parent's trusted and sorted flags.
    pub fn get_subdata_extraction(
        &self,
        parent: &CachedPayload,
        selection: &SubsetSelection,
    ) -> Result<CachedPayload, PayloadError> {
        let stream = parent.token_stream()?;
        self.store(
            parent.is_trusted()?,
            parent.is_sorted()?,
            Some(parent.clone()),
            |out| {
                extract(stream, selection, out)?;
                Ok(())
            },
        )
    }

    /// A new payload holding the single value at `root` (a `/`-separated
    /// path such as `"a/2/b"`) of `parent`.
    pub fn get_sub_object(&self, parent: &CachedPayload, root: &str) -> Result<CachedPayload, PayloadError> {
        let mut stream = TokenStream::with_root(parent.reader()?, root)?;
        self.store(
            parent.is_trusted()?,
            parent.is_sorted()?,
            Some(parent.clone()),
            |out| {
                let mut writer = JsonWriter::new(out);
                let first = stream.next_event()?;
                copy_value(&mut stream, first, &mut writer)?;
                writer.into_inner()?;
                Ok(())
            },
        )
    }
}

struct PayloadInner {
    backing: Mutex<Option<Backing>>,
    size: u64,
    trusted: bool,
    sorted: bool,
    parent: Option<CachedPayload>,
}

/// A stored document. Clones share the same storage.
#[derive(Clone)]
pub struct CachedPayload {
    inner: Arc<PayloadInner>,
}

impl fmt::Debug for CachedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPayload")
            .field("size", &self.inner.size)
            .field("trusted", &self.inner.trusted)
            .field("sorted", &self.inner.sorted)
            .field("destroyed", &self.is_destroyed())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

impl CachedPayload {
    fn ensure_live(&self) -> Result<(), PayloadStateError> {
        if self.is_destroyed() {
            Err(PayloadStateError::CacheDestroyed)
        } else {
            Ok(())
        }
    }

    /// Stored size in bytes.
    pub fn size(&self) -> Result<u64, PayloadStateError> {
        self.ensure_live()?;
        Ok(self.inner.size)
    }

    /// Whether the creator vouched that the content is valid.
    pub fn is_trusted(&self) -> Result<bool, PayloadStateError> {
        self.ensure_live()?;
        Ok(self.inner.trusted)
    }

    /// Whether the creator vouched that the content is in canonical order.
    pub fn is_sorted(&self) -> Result<bool, PayloadStateError> {
        self.ensure_live()?;
        Ok(self.inner.sorted)
    }

    /// A fresh reader over the stored bytes.
    pub fn reader(&self) -> Result<PayloadReader, PayloadError> {
        let backing = self.inner.backing.lock();
        let backing = backing.as_ref().ok_or(PayloadStateError::CacheDestroyed)?;
        Ok(backing.reader()?)
    }

    /// A fresh token stream over the stored document, owned by the caller.
    pub fn token_stream(&self) -> Result<TokenStream<PayloadReader>, PayloadError> {
        Ok(TokenStream::new(self.reader()?))
    }

    /// The stored bytes as a string.
    pub fn to_json_string(&self) -> Result<String, PayloadError> {
        let mut out = String::new();
        self.reader()?.read_to_string(&mut out)?;
        Ok(out)
    }

    /// Decode the stored document.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        Ok(serde_json::from_reader(self.reader()?)?)
    }

    /// Release the storage (and, for subsets, the parent's). Safe to call
    /// any number of times.
    pub fn destroy(&self) {
        let released = self.inner.backing.lock().take();
        if released.is_some() {
            tracing::debug!(size = self.inner.size, "payload cache destroyed");
        }
        drop(released);
        if let Some(parent) = &self.inner.parent {
            parent.destroy();
        }
    }

    /// Whether [`Self::destroy`] was called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.backing.lock().is_none()
    }
}
