use std::sync::Arc;

use harmoniq_rcu::{SharedSnapshot, Versioned, Writer};

use crate::config::TempoMapConfig;
use crate::error::Result;
use crate::map::TempoMap;

pub type SharedTempoMap = Versioned<TempoMap>;
pub type TempoMapSnapshot = SharedSnapshot<TempoMap>;

/// Cloneable handle to the published tempo map.
///
/// The audio thread calls [`TempoMapHandle::reader`] once per block and
/// keeps the snapshot for the whole block. Editors go through
/// [`TempoMapHandle::edit`] or [`TempoMapHandle::begin_write`]; the
/// non-realtime side calls [`TempoMapHandle::flush`] periodically to free
/// superseded versions.
#[derive(Debug, Clone, Default)]
pub struct TempoMapHandle {
    inner: Arc<SharedTempoMap>,
}

impl TempoMapHandle {
    pub fn new(map: TempoMap) -> Self {
        Self {
            inner: Arc::new(Versioned::new(map)),
        }
    }

    pub fn from_config(config: &TempoMapConfig) -> Result<Self> {
        TempoMap::from_config(config).map(Self::new)
    }

    /// Lock-free; safe on the audio thread.
    #[inline]
    pub fn reader(&self) -> TempoMapSnapshot {
        self.inner.reader()
    }

    pub fn begin_write(&self) -> Writer<'_, TempoMap> {
        self.inner.begin_write()
    }

    /// Applies `edit` to a private copy and publishes it on success. A failed
    /// edit publishes nothing.
    pub fn edit<R>(&self, edit: impl FnOnce(&mut TempoMap) -> Result<R>) -> Result<R> {
        self.inner.update(edit)
    }

    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    pub fn versioned(&self) -> &SharedTempoMap {
        &self.inner
    }
}

impl From<Arc<SharedTempoMap>> for TempoMapHandle {
    fn from(inner: Arc<SharedTempoMap>) -> Self {
        Self { inner }
    }
}
