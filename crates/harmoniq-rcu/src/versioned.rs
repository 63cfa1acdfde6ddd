use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};

/// Immutable, reference counted view of one published version.
pub type SharedSnapshot<T> = Arc<T>;

/// Holds the current published version of `T`.
///
/// Readers call [`Versioned::reader`] to obtain a private snapshot. The call
/// is lock-free and never allocates, so it is safe on the audio thread.
/// Writers are serialized: [`Versioned::begin_write`] waits for any other
/// writer, hands out a [`Writer`] whose [`Writer::copy`] clones the current
/// value once, and installs the edited copy when the writer goes out of scope.
///
/// Superseded versions are parked until [`Versioned::flush`] finds them
/// unreferenced. A reader dropping the last external handle therefore never
/// frees memory on its own thread.
pub struct Versioned<T> {
    current: ArcSwap<T>,
    writer: Mutex<()>,
    dead_wood: Mutex<Vec<Arc<T>>>,
    version: AtomicU64,
}

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(value),
            writer: Mutex::new(()),
            dead_wood: Mutex::new(Vec::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Returns whatever version is current at the moment of the call.
    #[inline]
    pub fn reader(&self) -> SharedSnapshot<T> {
        self.current.load_full()
    }

    /// Number of versions published since construction.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Acquires exclusive write access, waiting for any writer in progress.
    pub fn begin_write(&self) -> Writer<'_, T> {
        Writer {
            owner: self,
            copy: None,
            _guard: self.writer.lock(),
        }
    }

    /// Like [`Versioned::begin_write`] but gives up instead of waiting.
    pub fn try_begin_write(&self) -> Option<Writer<'_, T>> {
        let guard = self.writer.try_lock()?;
        Some(Writer {
            owner: self,
            copy: None,
            _guard: guard,
        })
    }

    /// Drops superseded versions that no reader still holds and returns how
    /// many were reclaimed.
    pub fn flush(&self) -> usize {
        let mut dead_wood = self.dead_wood.lock();
        let before = dead_wood.len();
        dead_wood.retain(|snapshot| Arc::strong_count(snapshot) > 1);
        let reclaimed = before - dead_wood.len();
        if reclaimed > 0 {
            tracing::debug!(
                reclaimed,
                still_referenced = dead_wood.len(),
                "reclaimed superseded snapshots"
            );
        }
        reclaimed
    }

    /// Superseded versions waiting for [`Versioned::flush`].
    pub fn pending_reclaim(&self) -> usize {
        self.dead_wood.lock().len()
    }

    fn install(&self, value: T) {
        let previous = self.current.swap(Arc::new(value));
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.dead_wood.lock().push(previous);
        tracing::debug!(version, "published snapshot");
    }
}

impl<T: Clone> Versioned<T> {
    /// Runs `edit` against a private copy. The copy is published when `edit`
    /// succeeds and discarded when it fails, leaving the current version
    /// untouched.
    pub fn update<R, E>(&self, edit: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let mut writer = self.begin_write();
        match edit(writer.copy()) {
            Ok(value) => {
                writer.publish();
                Ok(value)
            }
            Err(err) => {
                writer.abort();
                Err(err)
            }
        }
    }
}

impl<T: Default> Default for Versioned<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Versioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Versioned")
            .field("version", &self.version())
            .field("pending_reclaim", &self.pending_reclaim())
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`Versioned`] value.
///
/// Dropping the writer publishes the private copy if [`Writer::copy`] was
/// called; a writer that never copied publishes nothing.
pub struct Writer<'a, T> {
    owner: &'a Versioned<T>,
    copy: Option<T>,
    _guard: MutexGuard<'a, ()>,
}

impl<'a, T: Clone> Writer<'a, T> {
    /// Private, writer-owned copy of the current version. The clone happens on
    /// the first call only.
    pub fn copy(&mut self) -> &mut T {
        let owner = self.owner;
        self.copy
            .get_or_insert_with(|| T::clone(&owner.current.load()))
    }
}

impl<'a, T> Writer<'a, T> {
    /// The published version, loaded at call time. Only this writer can
    /// publish while it holds the write lock, so this is also the version
    /// its copy was taken from.
    pub fn base(&self) -> SharedSnapshot<T> {
        self.owner.reader()
    }

    pub fn has_copy(&self) -> bool {
        self.copy.is_some()
    }

    /// Publishes now instead of at the end of the scope.
    pub fn publish(self) {}

    /// Throws the private copy away without publishing it.
    pub fn abort(mut self) {
        if self.copy.take().is_some() {
            tracing::debug!("discarded unpublished snapshot");
        }
    }
}

impl<'a, T> Drop for Writer<'a, T> {
    fn drop(&mut self) {
        if let Some(value) = self.copy.take() {
            self.owner.install(value);
        }
    }
}
