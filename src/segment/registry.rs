//! Node-local registry of growing and sealed segments.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use crate::error::{FrameaError, Result};

use super::filter::{matches_all, SegmentFilter};
use super::metrics::SegmentMetrics;
use super::release::ReleasePool;
use super::{
    DataScope, ReleaseScope, Segment, SegmentId, SegmentLevel, SegmentRef, SegmentType,
};

/// Registry of all query-servable segments hosted by this node.
///
/// Two id-indexed tables (growing, sealed) sit behind a single
/// reader-writer lock. Admission is versioned replace-or-reject; removed
/// and replaced segments are handed to the deferred-release pool after the
/// lock is dropped. Read pins are acquired while the registry lock is held
/// as a reader, so a successfully pinned segment cannot be fully released
/// until it is unpinned.
#[derive(Debug)]
pub struct SegmentRegistry {
    tables: RwLock<SegmentTables>,
    metrics: Arc<SegmentMetrics>,
    release_pool: Arc<ReleasePool>,
}

#[derive(Debug, Default)]
struct SegmentTables {
    growing: AHashMap<SegmentId, SegmentRef>,
    sealed: AHashMap<SegmentId, SegmentRef>,
}

impl SegmentTables {
    fn table(&self, segment_type: SegmentType) -> &AHashMap<SegmentId, SegmentRef> {
        match segment_type {
            SegmentType::Growing => &self.growing,
            SegmentType::Sealed => &self.sealed,
        }
    }

    fn table_mut(&mut self, segment_type: SegmentType) -> &mut AHashMap<SegmentId, SegmentRef> {
        match segment_type {
            SegmentType::Growing => &mut self.growing,
            SegmentType::Sealed => &mut self.sealed,
        }
    }

    /// Visit matching segments, cheapest plan first: a type hint restricts
    /// the scan to one table, an id-set hint turns it into point lookups,
    /// the remaining filters run as a composed predicate. Returning false
    /// from the visitor stops the scan of the current table.
    fn range_with_filter(
        &self,
        mut visit: impl FnMut(SegmentId, SegmentType, &SegmentRef) -> bool,
        filters: &[Box<dyn SegmentFilter>],
    ) {
        let mut type_hint = None;
        let mut id_hint: Option<AHashSet<SegmentId>> = None;
        let mut residual: Vec<&dyn SegmentFilter> = Vec::with_capacity(filters.len());

        for filter in filters {
            if let Some(segment_type) = filter.segment_type() {
                type_hint = Some(segment_type);
                continue;
            }
            if let Some(ids) = filter.segment_ids() {
                id_hint.get_or_insert_with(AHashSet::new).extend(ids);
                continue;
            }
            residual.push(filter.as_ref());
        }

        let passes =
            |segment: &SegmentRef| residual.iter().all(|filter| filter.matches(segment.as_ref()));

        let tables: Vec<(SegmentType, &AHashMap<SegmentId, SegmentRef>)> = match type_hint {
            Some(segment_type) => vec![(segment_type, self.table(segment_type))],
            None => vec![
                (SegmentType::Growing, &self.growing),
                (SegmentType::Sealed, &self.sealed),
            ],
        };

        for (segment_type, table) in tables {
            match &id_hint {
                Some(ids) => {
                    for id in ids {
                        if let Some(segment) = table.get(id) {
                            if passes(segment) && !visit(*id, segment_type, segment) {
                                break;
                            }
                        }
                    }
                }
                None => {
                    for (id, segment) in table.iter() {
                        if passes(segment) && !visit(*id, segment_type, segment) {
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl SegmentRegistry {
    pub fn new(metrics: Arc<SegmentMetrics>, release_pool: Arc<ReleasePool>) -> Self {
        SegmentRegistry {
            tables: RwLock::new(SegmentTables::default()),
            metrics,
            release_pool,
        }
    }

    /// Admit segments into the table for `segment_type`.
    ///
    /// An incoming segment whose version does not exceed the resident one
    /// is released (scope=All) on the spot and the resident entry stays.
    /// A replaced predecessor is queued on the release pool.
    pub fn put(&self, segment_type: SegmentType, segments: Vec<SegmentRef>) {
        let mut replaced: Vec<SegmentRef> = Vec::new();
        {
            let mut tables = self.tables.write();
            {
                let table = tables.table_mut(segment_type);
                for segment in segments {
                    match table.get(&segment.id()) {
                        Some(old) if old.version() >= segment.version() => {
                            log::warn!(
                                "segment {} version {} is not newer than resident version {}, dropping it",
                                segment.id(),
                                segment.version(),
                                old.version()
                            );
                            segment.release(ReleaseScope::All);
                            continue;
                        }
                        Some(old) => replaced.push(Arc::clone(old)),
                        None => {}
                    }
                    self.metrics.record_admitted(segment.as_ref());
                    table.insert(segment.id(), segment);
                }
            }
            self.refresh_cardinality(&tables);
        }

        for old in replaced {
            self.release_pool.submit(old);
        }
    }

    /// Apply `action` to every matching segment; returns how many times
    /// the action reported success.
    pub fn update_by(
        &self,
        action: impl Fn(&dyn Segment) -> bool,
        filters: &[Box<dyn SegmentFilter>],
    ) -> usize {
        let tables = self.tables.read();
        let mut updated = 0;
        tables.range_with_filter(
            |_, _, segment| {
                if action(segment.as_ref()) {
                    updated += 1;
                }
                true
            },
            filters,
        );
        updated
    }

    /// Look the id up in growing first, then sealed.
    pub fn get(&self, segment_id: SegmentId) -> Option<SegmentRef> {
        let tables = self.tables.read();
        tables
            .growing
            .get(&segment_id)
            .or_else(|| tables.sealed.get(&segment_id))
            .cloned()
    }

    /// Look the id up in the named table.
    pub fn get_with_type(
        &self,
        segment_id: SegmentId,
        segment_type: SegmentType,
    ) -> Option<SegmentRef> {
        self.tables.read().table(segment_type).get(&segment_id).cloned()
    }

    pub fn get_sealed(&self, segment_id: SegmentId) -> Option<SegmentRef> {
        self.get_with_type(segment_id, SegmentType::Sealed)
    }

    pub fn get_growing(&self, segment_id: SegmentId) -> Option<SegmentRef> {
        self.get_with_type(segment_id, SegmentType::Growing)
    }

    /// Unpinned snapshot of all matching segments. Returned handles may be
    /// released by a later writer; callers that cannot tolerate that must
    /// use [`SegmentRegistry::get_and_pin_by`].
    pub fn get_by(&self, filters: &[Box<dyn SegmentFilter>]) -> Vec<SegmentRef> {
        let tables = self.tables.read();
        let mut out = Vec::new();
        tables.range_with_filter(
            |_, _, segment| {
                out.push(Arc::clone(segment));
                true
            },
            filters,
        );
        out
    }

    /// Matching segments with their read pins acquired, L0 excluded.
    ///
    /// On any pin failure every pin taken by this call is dropped and the
    /// failure is returned.
    pub fn get_and_pin_by(&self, filters: &[Box<dyn SegmentFilter>]) -> Result<Vec<SegmentRef>> {
        let tables = self.tables.read();
        let mut pinned: Vec<SegmentRef> = Vec::new();
        let mut failure: Option<FrameaError> = None;

        tables.range_with_filter(
            |_, _, segment| {
                if failure.is_some() {
                    return false;
                }
                if segment.level() == SegmentLevel::L0 {
                    return true;
                }
                match segment.rlock() {
                    Ok(()) => {
                        pinned.push(Arc::clone(segment));
                        true
                    }
                    Err(err) => {
                        failure = Some(err);
                        false
                    }
                }
            },
            filters,
        );

        if let Some(err) = failure {
            for segment in &pinned {
                segment.runlock();
            }
            return Err(err);
        }
        Ok(pinned)
    }

    /// Pin the named ids, applying `filters` on top.
    ///
    /// Both the growing and the sealed hit are pinned when both exist. An
    /// id whose sealed hit is L0 is skipped entirely; an id matching
    /// nothing fails the whole call with `SegmentNotLoaded` and drops the
    /// pins already taken.
    pub fn get_and_pin(
        &self,
        segment_ids: &[SegmentId],
        filters: &[Box<dyn SegmentFilter>],
    ) -> Result<Vec<SegmentRef>> {
        let tables = self.tables.read();
        let mut pinned: Vec<SegmentRef> = Vec::with_capacity(segment_ids.len());

        let result = (|| {
            for &id in segment_ids {
                let growing = tables.growing.get(&id);
                let sealed = tables.sealed.get(&id);

                // L0 sealed hits carry delete records only.
                if let Some(sealed) = sealed {
                    if sealed.level() == SegmentLevel::L0 {
                        continue;
                    }
                }

                let growing = match growing {
                    Some(segment) if matches_all(segment.as_ref(), filters) => Some(segment),
                    _ => None,
                };
                let sealed = match sealed {
                    Some(segment) if matches_all(segment.as_ref(), filters) => Some(segment),
                    _ => None,
                };

                if growing.is_none() && sealed.is_none() {
                    return Err(FrameaError::segment_not_loaded(id));
                }

                if let Some(segment) = growing {
                    segment.rlock()?;
                    pinned.push(Arc::clone(segment));
                }
                if let Some(segment) = sealed {
                    segment.rlock()?;
                    pinned.push(Arc::clone(segment));
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => Ok(pinned),
            Err(err) => {
                for segment in &pinned {
                    segment.runlock();
                }
                Err(err)
            }
        }
    }

    /// Drop the read pins taken by a `get_and_pin*` call.
    pub fn unpin(&self, segments: &[SegmentRef]) {
        for segment in segments {
            segment.runlock();
        }
    }

    /// Remove the id from the table(s) named by `scope`.
    ///
    /// Returns how many entries left the growing and sealed tables (each 0
    /// or 1). Removed segments are released through the pool.
    pub fn remove(&self, segment_id: SegmentId, scope: DataScope) -> (usize, usize) {
        let mut removed: Vec<SegmentRef> = Vec::with_capacity(2);
        let mut growing_removed = 0;
        let mut sealed_removed = 0;
        {
            let mut tables = self.tables.write();
            if matches!(scope, DataScope::Streaming | DataScope::All) {
                if let Some(segment) = tables.growing.remove(&segment_id) {
                    growing_removed = 1;
                    removed.push(segment);
                }
            }
            if matches!(scope, DataScope::Historical | DataScope::All) {
                if let Some(segment) = tables.sealed.remove(&segment_id) {
                    sealed_removed = 1;
                    removed.push(segment);
                }
            }
            self.refresh_cardinality(&tables);
        }

        for segment in removed {
            self.release_pool.submit(segment);
        }
        (growing_removed, sealed_removed)
    }

    /// Remove every matching segment; returns `(growing, sealed)` counts.
    pub fn remove_by(&self, filters: &[Box<dyn SegmentFilter>]) -> (usize, usize) {
        let mut removed: Vec<SegmentRef> = Vec::new();
        let mut growing_removed = 0;
        let mut sealed_removed = 0;
        {
            let mut tables = self.tables.write();
            let mut victims: Vec<(SegmentId, SegmentType)> = Vec::new();
            tables.range_with_filter(
                |id, segment_type, _| {
                    victims.push((id, segment_type));
                    true
                },
                filters,
            );
            for (id, segment_type) in victims {
                if let Some(segment) = tables.table_mut(segment_type).remove(&id) {
                    match segment_type {
                        SegmentType::Growing => growing_removed += 1,
                        SegmentType::Sealed => sealed_removed += 1,
                    }
                    removed.push(segment);
                }
            }
            self.refresh_cardinality(&tables);
        }

        for segment in removed {
            self.release_pool.submit(segment);
        }
        (growing_removed, sealed_removed)
    }

    /// Empty both tables and queue every segment for release.
    pub fn clear(&self) {
        let mut removed: Vec<SegmentRef> = Vec::new();
        {
            let mut tables = self.tables.write();
            removed.extend(tables.growing.drain().map(|(_, segment)| segment));
            removed.extend(tables.sealed.drain().map(|(_, segment)| segment));
            self.refresh_cardinality(&tables);
        }

        for segment in removed {
            self.release_pool.submit(segment);
        }
    }

    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read();
        tables.growing.is_empty() && tables.sealed.is_empty()
    }

    fn refresh_cardinality(&self, tables: &SegmentTables) {
        let mut collections = AHashSet::new();
        let mut partitions = AHashSet::new();
        for segment in tables.growing.values().chain(tables.sealed.values()) {
            collections.insert(segment.collection());
            partitions.insert(segment.partition());
        }
        self.metrics.set_cardinality(collections.len(), partitions.len());
    }
}
