//! # Spool File Management
//!
//! A [`TempFilesManager`] owns one spool directory. Every file it hands out
//! is tracked until deleted, and registered listeners hear about each file
//! the moment it is created. Tests count those notifications against the
//! files still tracked afterwards to prove that failed operations leave
//! nothing behind.
//!
//! Files are handed out as [`SpoolGuard`]s. Dropping a guard deletes its
//! file and stops tracking it, so cleanup happens on every exit path,
//! including early returns through `?`.
//!
//! The manager is shared (`Arc`) between concurrent operations; the file set
//! and the listener list each sit behind a `parking_lot::Mutex`, which never
//! poisons if a holder panics.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TempFileError;

/// Receives a callback for every spool file created.
pub trait TempFileListener: Send + Sync {
    /// `path` was just created.
    fn created(&self, path: &Path);
}

impl<F> TempFileListener for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn created(&self, path: &Path) {
        self(path)
    }
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Tracks spool files in one directory.
pub struct TempFilesManager {
    dir: PathBuf,
    files: Mutex<BTreeSet<PathBuf>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn TempFileListener>)>>,
    next_listener: AtomicU64,
}

impl fmt::Debug for TempFilesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFilesManager")
            .field("dir", &self.dir)
            .field("files", &self.files.lock().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl TempFilesManager {
    /// Manage spool files under `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Arc<Self>, TempFileError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| TempFileError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Arc::new(Self {
            dir,
            files: Mutex::new(BTreeSet::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }))
    }

    /// The spool directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty, uniquely named file `<prefix>.<uuid>.<ext>`.
    ///
    /// Listeners are notified before this returns. The file is deleted when
    /// the returned guard is dropped.
    pub fn generate_temp_file(
        self: &Arc<Self>,
        prefix: &str,
        extension: &str,
    ) -> Result<SpoolGuard, TempFileError> {
        let path = self
            .dir
            .join(format!("{prefix}.{}.{extension}", Uuid::new_v4().simple()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| TempFileError::CreateFile {
                path: path.clone(),
                source,
            })?;
        self.files.lock().insert(path.clone());
        tracing::debug!(path = %path.display(), "created temp file");

        // Clone out so a listener can call back into the manager.
        let listeners: Vec<Arc<dyn TempFileListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.created(&path);
        }

        Ok(SpoolGuard {
            manager: Arc::clone(self),
            path,
        })
    }

    /// Register a creation listener.
    pub fn add_listener(&self, listener: Arc<dyn TempFileListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    /// Files currently tracked, sorted by path.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.files.lock().iter().cloned().collect()
    }

    /// Whether no files are tracked.
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Delete every tracked file.
    ///
    /// Guards still alive for these files become no-ops on drop.
    pub fn cleanup(&self) {
        let files = std::mem::take(&mut *self.files.lock());
        for path in files {
            remove_quietly(&path);
        }
    }

    fn release(&self, path: &Path) {
        if self.files.lock().remove(path) {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "deleted temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete temp file"),
    }
}

/// Ownership of one spool file. Dropping the guard deletes the file.
#[derive(Debug)]
pub struct SpoolGuard {
    manager: Arc<TempFilesManager>,
    path: PathBuf,
}

impl SpoolGuard {
    /// Location of the spool file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpoolGuard {
    fn drop(&mut self) {
        self.manager.release(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn manager() -> (tempfile::TempDir, Arc<TempFilesManager>) {
        let dir = tempfile::tempdir().unwrap();
        let tfm = TempFilesManager::new(dir.path().join("spool")).unwrap();
        (dir, tfm)
    }

    #[test]
    fn test_guard_drop_deletes_and_untracks() {
        let (_dir, tfm) = manager();
        let guard = tfm.generate_temp_file("sortout", "json").unwrap();
        let path = guard.path().to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("sortout."));
        assert_eq!(tfm.temp_files(), [path.clone()]);

        drop(guard);
        assert!(!path.exists());
        assert!(tfm.is_empty());
    }

    #[test]
    fn test_listeners_hear_every_creation() {
        let (_dir, tfm) = manager();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = tfm.add_listener(Arc::new(move |_: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let _a = tfm.generate_temp_file("a", "tmp").unwrap();
        let _b = tfm.generate_temp_file("b", "tmp").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(tfm.remove_listener(id));
        assert!(!tfm.remove_listener(id));
        let _c = tfm.generate_temp_file("c", "tmp").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(tfm.temp_files().len(), 3);
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let (_dir, tfm) = manager();
        let guard = tfm.generate_temp_file("x", "json").unwrap();
        let path = guard.path().to_path_buf();
        tfm.cleanup();
        assert!(tfm.is_empty());
        assert!(!path.exists());
        drop(guard);
        assert!(tfm.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let (_dir, tfm) = manager();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tfm = Arc::clone(&tfm);
                std::thread::spawn(move || tfm.generate_temp_file(&format!("t{i}"), "json").unwrap())
            })
            .collect();
        let guards: Vec<SpoolGuard> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(tfm.temp_files().len(), 8);
        drop(guards);
        assert!(tfm.is_empty());
    }
}
