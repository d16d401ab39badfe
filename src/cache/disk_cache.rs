//! Capacity-bounded cache of disk-resident sealed segments.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::{FrameaError, Result};
use crate::segment::{SegmentId, SegmentRef};

use super::single_flight::SingleFlight;

/// Resolves a segment on a cache miss.
///
/// `Ok(None)` means the segment is no longer registered and there is
/// nothing to cache; `Err` is a load failure surfaced to the caller.
pub type CacheLoader = Box<dyn Fn(SegmentId) -> Result<Option<SegmentRef>> + Send + Sync>;

/// Size accountant for a segment admitted to the cache.
pub type CacheSizer = Box<dyn Fn(&SegmentRef) -> u64 + Send + Sync>;

/// Runs for every evicted entry once no pins remain.
pub type CacheFinalizer = Box<dyn Fn(SegmentId, &SegmentRef) + Send + Sync>;

/// Disk-budgeted segment cache with lazy scavenging.
///
/// `get_or_load` pins a resident entry or loads it through the configured
/// loader, deduplicated per key; when the size account exceeds the
/// capacity, unpinned entries are evicted in approximate-LRU order and the
/// finalizer runs for each. Loader and finalizer callbacks are always
/// invoked with the cache lock released.
pub struct BoundedDiskCache {
    capacity: u64,
    tables: Mutex<CacheTables>,
    flights: SingleFlight<SegmentId, LoadOutcome>,
    loader: CacheLoader,
    sizer: CacheSizer,
    finalizer: CacheFinalizer,
}

#[derive(Default)]
struct CacheTables {
    entries: AHashMap<SegmentId, CacheEntry>,
    total_size: u64,
    clock: u64,
}

struct CacheEntry {
    segment: SegmentRef,
    size: u64,
    pins: u32,
    touch: u64,
    doomed: bool,
}

#[derive(Clone)]
enum LoadOutcome {
    /// Another flight already made the entry resident.
    Resident,
    /// The loader produced a segment and it was inserted.
    Loaded,
    /// The registry no longer holds the segment.
    Missing,
    /// The loader failed; nothing was cached.
    Failed(Arc<FrameaError>),
}

enum PinAttempt {
    Pinned(SegmentRef),
    Removing,
    Miss,
}

/// Re-materialise a shared load failure for one caller, keeping the typed
/// kinds a caller can act on.
fn shared_error(err: &FrameaError) -> FrameaError {
    match err {
        FrameaError::CollectionNotLoaded(id) => FrameaError::CollectionNotLoaded(*id),
        FrameaError::SegmentNotLoaded(id) => FrameaError::SegmentNotLoaded(*id),
        FrameaError::PinAcquisitionFailed(id) => FrameaError::PinAcquisitionFailed(*id),
        other => FrameaError::loader(other.to_string()),
    }
}

impl BoundedDiskCache {
    pub fn new(
        capacity: u64,
        sizer: CacheSizer,
        loader: CacheLoader,
        finalizer: CacheFinalizer,
    ) -> Self {
        BoundedDiskCache {
            capacity,
            tables: Mutex::new(CacheTables::default()),
            flights: SingleFlight::new(),
            loader,
            sizer,
            finalizer,
        }
    }

    /// Pin and return the cached segment, loading it on a miss.
    ///
    /// Every successful return holds one pin; callers drop it with
    /// [`BoundedDiskCache::release`].
    pub fn get_or_load(&self, segment_id: SegmentId) -> Result<SegmentRef> {
        loop {
            match self.pin_resident(segment_id) {
                PinAttempt::Pinned(segment) => return Ok(segment),
                PinAttempt::Removing => {
                    return Err(FrameaError::segment_not_loaded(segment_id));
                }
                PinAttempt::Miss => {}
            }

            let outcome = self.flights.work(segment_id, || self.load(segment_id));
            match outcome {
                // Pin on the next turn; the entry may have been scavenged
                // again in the meantime, in which case the loop reloads.
                LoadOutcome::Resident | LoadOutcome::Loaded => {}
                LoadOutcome::Missing => {
                    return Err(FrameaError::segment_not_loaded(segment_id));
                }
                LoadOutcome::Failed(err) => {
                    return Err(shared_error(&err));
                }
            }
        }
    }

    /// Drop a pin taken by [`BoundedDiskCache::get_or_load`].
    pub fn release(&self, segment_id: SegmentId) {
        let finalize = {
            let mut tables = self.tables.lock();
            let doomed_and_idle = match tables.entries.get_mut(&segment_id) {
                Some(entry) => {
                    debug_assert!(entry.pins > 0, "release without a matching pin");
                    entry.pins = entry.pins.saturating_sub(1);
                    entry.doomed && entry.pins == 0
                }
                None => false,
            };
            if doomed_and_idle {
                let entry = tables.entries.remove(&segment_id);
                if let Some(entry) = &entry {
                    tables.total_size = tables.total_size.saturating_sub(entry.size);
                }
                entry
            } else {
                None
            }
        };

        if let Some(entry) = finalize {
            (self.finalizer)(segment_id, &entry.segment);
        }
    }

    /// Force-evict the entry. The finalizer runs immediately when the
    /// entry is unpinned, otherwise once the last pin is released.
    pub fn remove(&self, segment_id: SegmentId) {
        let finalize = {
            let mut tables = self.tables.lock();
            let pins = match tables.entries.get(&segment_id) {
                Some(entry) => entry.pins,
                None => return,
            };
            if pins > 0 {
                if let Some(entry) = tables.entries.get_mut(&segment_id) {
                    entry.doomed = true;
                }
                None
            } else {
                let entry = tables.entries.remove(&segment_id);
                if let Some(entry) = &entry {
                    tables.total_size = tables.total_size.saturating_sub(entry.size);
                }
                entry
            }
        };

        if let Some(entry) = finalize {
            log::debug!("evicting segment {segment_id} from the disk cache");
            (self.finalizer)(segment_id, &entry.segment);
        }
    }

    /// Evict every unpinned entry and doom the pinned ones.
    pub fn clear(&self) {
        let victims = {
            let mut tables = self.tables.lock();
            let ids: Vec<SegmentId> = tables.entries.keys().copied().collect();
            let mut victims = Vec::new();
            for id in ids {
                let pins = tables.entries.get(&id).map(|entry| entry.pins).unwrap_or(0);
                if pins > 0 {
                    if let Some(entry) = tables.entries.get_mut(&id) {
                        entry.doomed = true;
                    }
                } else if let Some(entry) = tables.entries.remove(&id) {
                    tables.total_size = tables.total_size.saturating_sub(entry.size);
                    victims.push((id, entry));
                }
            }
            victims
        };

        for (id, entry) in victims {
            (self.finalizer)(id, &entry.segment);
        }
    }

    /// Sum of the sizes of resident entries.
    pub fn resident_size(&self) -> u64 {
        self.tables.lock().total_size
    }

    /// Number of resident entries.
    pub fn resident_count(&self) -> usize {
        self.tables.lock().entries.len()
    }

    fn pin_resident(&self, segment_id: SegmentId) -> PinAttempt {
        let mut tables = self.tables.lock();
        tables.clock += 1;
        let touch = tables.clock;
        match tables.entries.get_mut(&segment_id) {
            Some(entry) if entry.doomed => PinAttempt::Removing,
            Some(entry) => {
                entry.pins += 1;
                entry.touch = touch;
                PinAttempt::Pinned(Arc::clone(&entry.segment))
            }
            None => PinAttempt::Miss,
        }
    }

    fn load(&self, segment_id: SegmentId) -> LoadOutcome {
        if self.tables.lock().entries.contains_key(&segment_id) {
            return LoadOutcome::Resident;
        }

        log::debug!("disk cache miss for segment {segment_id}");
        match (self.loader)(segment_id) {
            Ok(Some(segment)) => {
                self.insert(segment_id, segment);
                LoadOutcome::Loaded
            }
            Ok(None) => LoadOutcome::Missing,
            Err(err) => {
                log::warn!("failed to cache sealed segment {segment_id}: {err}");
                LoadOutcome::Failed(Arc::new(err))
            }
        }
    }

    fn insert(&self, segment_id: SegmentId, segment: SegmentRef) {
        let size = (self.sizer)(&segment);
        let victims = {
            let mut tables = self.tables.lock();
            tables.clock += 1;
            let touch = tables.clock;
            tables.total_size += size;
            let previous = tables.entries.insert(
                segment_id,
                CacheEntry {
                    segment,
                    size,
                    pins: 0,
                    touch,
                    doomed: false,
                },
            );
            debug_assert!(previous.is_none(), "insert over a resident entry");
            self.scavenge(&mut tables, segment_id)
        };

        for (id, entry) in victims {
            log::debug!("evicting segment {id} from the disk cache");
            (self.finalizer)(id, &entry.segment);
        }
    }

    /// Evict unpinned entries, oldest touch first, until the size account
    /// fits the capacity. The entry named by `keep` is exempt so a fresh
    /// oversized insert cannot evict itself before its caller pins it.
    fn scavenge(
        &self,
        tables: &mut CacheTables,
        keep: SegmentId,
    ) -> Vec<(SegmentId, CacheEntry)> {
        let mut victims = Vec::new();
        while tables.total_size > self.capacity {
            let candidate = tables
                .entries
                .iter()
                .filter(|(id, entry)| **id != keep && entry.pins == 0 && !entry.doomed)
                .min_by_key(|(_, entry)| entry.touch)
                .map(|(id, _)| *id);

            let Some(victim_id) = candidate else {
                break;
            };
            if let Some(entry) = tables.entries.remove(&victim_id) {
                tables.total_size = tables.total_size.saturating_sub(entry.size);
                victims.push((victim_id, entry));
            }
        }
        victims
    }
}
