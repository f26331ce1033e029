//! The set of pyramids currently displayed on the map
//!
//! Readers take a cheap snapshot (`Arc` clone) and render from it without
//! holding any lock; writers replace the whole list and bump the data
//! timestamp so cached tiles can be recognized as stale.

use heatmap_core::SpatialPyramid;
use log::debug;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`HeatmapSet::add`]
pub type HeatmapId = u64;

#[derive(Debug, Clone)]
pub struct HeatmapEntry {
    pub id: HeatmapId,
    pub pyramid: Arc<SpatialPyramid>,
}

#[derive(Debug)]
pub struct HeatmapSet {
    entries: RwLock<Arc<Vec<HeatmapEntry>>>,
    next_id: AtomicU64,
    data_timestamp: AtomicI64,
}

impl Default for HeatmapSet {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatmapSet {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
            data_timestamp: AtomicI64::new(now_millis()),
        }
    }

    pub fn add(&self, pyramid: Arc<SpatialPyramid>) -> HeatmapId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.update(|entries| entries.push(HeatmapEntry { id, pyramid }));
        debug!("Added heatmap {} ({} heatmaps displayed)", id, self.len());
        id
    }

    /// Returns false when no heatmap has this id
    pub fn remove(&self, id: HeatmapId) -> bool {
        let mut removed = false;
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            removed = entries.len() != before;
        });
        removed
    }

    pub fn clear(&self) {
        self.update(|entries| entries.clear());
    }

    /// Current list of heatmaps; stays valid while the set keeps changing
    pub fn snapshot(&self) -> Arc<Vec<HeatmapEntry>> {
        Arc::clone(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Milliseconds timestamp of the last change
    pub fn data_timestamp(&self) -> i64 {
        self.data_timestamp.load(Ordering::SeqCst)
    }

    pub fn total_count(&self) -> u64 {
        self.snapshot()
            .iter()
            .map(|entry| entry.pyramid.total_count())
            .fold(0u64, u64::saturating_add)
    }

    fn update<F: FnOnce(&mut Vec<HeatmapEntry>)>(&self, f: F) {
        {
            let mut guard = self.entries.write();
            let mut entries = (**guard).clone();
            f(&mut entries);
            *guard = Arc::new(entries);
        }
        self.touch();
    }

    // Strictly later than any render that may have read the old list
    fn touch(&self) {
        let now = now_millis() + 1;
        let _ = self
            .data_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)));
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
