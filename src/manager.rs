//! Facade wiring the registry, the disk cache and the collection registry.

use std::sync::Arc;

use crate::cache::BoundedDiskCache;
use crate::collection::CollectionRegistry;
use crate::config::ManagerConfig;
use crate::error::{FrameaError, Result};
use crate::loader::{FieldLoader, LoadMode};
use crate::segment::filter::{self, SegmentFilter};
use crate::segment::metrics::{MetricsSnapshot, SegmentMetrics};
use crate::segment::registry::SegmentRegistry;
use crate::segment::release::ReleasePool;
use crate::segment::{DataScope, ReleaseScope, Segment, SegmentId, SegmentRef, SegmentType};

/// Owner of the node-local segment view.
///
/// Composes the collection registry, the segment registry and the disk
/// cache; the cache loader resolves sealed segments through the registry
/// and loads their field data in mapped mode.
pub struct Manager {
    pub collections: Arc<CollectionRegistry>,
    pub segments: Arc<SegmentRegistry>,
    pub disk_cache: Arc<BoundedDiskCache>,
    release_pool: Arc<ReleasePool>,
    metrics: Arc<SegmentMetrics>,
}

impl Manager {
    pub fn new(
        node_id: i64,
        field_loader: Arc<dyn FieldLoader>,
        config: &ManagerConfig,
    ) -> Result<Self> {
        let metrics = Arc::new(SegmentMetrics::new(node_id));
        let release_pool = Arc::new(ReleasePool::new(
            config.release_worker_threads,
            Arc::clone(&metrics),
        )?);
        let segments = Arc::new(SegmentRegistry::new(
            Arc::clone(&metrics),
            Arc::clone(&release_pool),
        ));
        let collections = Arc::new(CollectionRegistry::new());

        let loader = {
            let segments = Arc::clone(&segments);
            let collections = Arc::clone(&collections);
            let field_loader = Arc::clone(&field_loader);
            Box::new(move |segment_id: SegmentId| -> Result<Option<SegmentRef>> {
                // Pinning under the registry read lock keeps the segment
                // alive for the duration of the load without stalling
                // registry writers behind object-storage IO.
                let pinned = segments.get_and_pin_by(&[
                    filter::with_id(segment_id),
                    filter::with_type(SegmentType::Sealed),
                ])?;
                let Some(segment) = pinned.into_iter().next() else {
                    // The segment has been released; nothing to cache.
                    return Ok(None);
                };

                let info = segment.load_info();
                let outcome = collections
                    .get(segment.collection())
                    .ok_or_else(|| FrameaError::collection_not_loaded(segment.collection()))
                    .and_then(|collection| {
                        field_loader.load_sealed_fields(
                            &collection,
                            segment.as_ref(),
                            &info.binlog_paths,
                            info.row_count,
                            LoadMode::Mapped,
                        )
                    });
                segment.runlock();
                outcome.map(|()| Some(segment))
            })
        };

        let sizer = Box::new(|segment: &SegmentRef| segment.resource_usage().disk_bytes);

        let finalizer = Box::new(|segment_id: SegmentId, segment: &SegmentRef| {
            log::debug!("releasing cached data of segment {segment_id}");
            segment.release(ReleaseScope::Data);
        });

        let disk_cache = Arc::new(BoundedDiskCache::new(
            config.disk_capacity_bytes,
            sizer,
            loader,
            finalizer,
        ));

        Ok(Manager {
            collections,
            segments,
            disk_cache,
            release_pool,
            metrics,
        })
    }

    /// Remove a segment everywhere.
    ///
    /// The cache entry is invalidated before the registry entry, so the
    /// cache finalizer's data release can never run after the pool's full
    /// release of the same segment.
    pub fn remove(&self, segment_id: SegmentId, scope: DataScope) -> (usize, usize) {
        if matches!(scope, DataScope::Historical | DataScope::All) {
            self.disk_cache.remove(segment_id);
        }
        self.segments.remove(segment_id, scope)
    }

    /// Remove every segment matching the filters, cache entries first.
    pub fn remove_by(&self, filters: &[Box<dyn SegmentFilter>]) -> (usize, usize) {
        for segment in self.segments.get_by(filters) {
            if segment.segment_type() == SegmentType::Sealed {
                self.disk_cache.remove(segment.id());
            }
        }
        self.segments.remove_by(filters)
    }

    /// Drop every segment and cache entry.
    pub fn clear(&self) {
        self.disk_cache.clear();
        self.segments.clear();
    }

    /// Current metrics snapshot for an external sink.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Deterministic teardown: clear the node and drain deferred releases.
    pub fn shutdown(&self) {
        self.clear();
        self.release_pool.shutdown();
    }
}
