//! The reader/writer lock primitive used to guard the vnode cache, the
//! share table, and the session list (`spec.md` §2 item 9, §4.6 "Lock
//! discipline").
//!
//! Many concurrent readers, or one exclusive writer; a writer queued while
//! readers are already holding the lock is not starved by a steady stream
//! of new readers. `tokio::sync::RwLock` already documents this fairness
//! guarantee (readers that arrive after a pending writer queue behind it),
//! so this type is a thin, spec-named wrapper rather than a hand-rolled
//! semaphore pair — acquiring and releasing stays balanced on every exit
//! path because the guards are RAII and the lock itself is never exposed.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Guards `T` with reader/writer semantics; readers run concurrently,
/// writers are exclusive and are not starved by new readers.
pub struct PriorityLock<T> {
    inner: RwLock<T>,
}

impl<T> PriorityLock<T> {
    pub fn new(value: T) -> Self {
        PriorityLock { inner: RwLock::new(value) }
    }

    /// Acquires a shared (read) view.
    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().await
    }

    /// Acquires an exclusive (write) view.
    pub async fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().await
    }
}
