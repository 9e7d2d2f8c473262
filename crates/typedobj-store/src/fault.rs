//! Fault injection for payload creation.
//!
//! [`PayloadManager`](crate::PayloadManager) calls an installed
//! [`FaultHook`] at fixed points of its spooling work. Returning an error
//! from the hook makes the operation fail exactly as a real I/O error would,
//! which is how the cleanup guarantees are tested.

/// A named point in a payload operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// The backing spool file exists but nothing was written yet.
    AfterSpoolCreated,
    /// Between chunks while copying input into the backing store.
    DuringCopy,
}

/// Called at each [`FaultPoint`]; an `Err` aborts the operation.
pub trait FaultHook: Send + Sync {
    /// Inspect `point`, failing to simulate an I/O error there.
    fn check(&self, point: FaultPoint) -> std::io::Result<()>;
}

impl<F> FaultHook for F
where
    F: Fn(FaultPoint) -> std::io::Result<()> + Send + Sync,
{
    fn check(&self, point: FaultPoint) -> std::io::Result<()> {
        self(point)
    }
}
