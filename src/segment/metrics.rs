//! Node-level segment accounting.
//!
//! Counters are maintained inline by the registry and exposed as a
//! snapshot for an external sink to scrape; nothing here talks to a
//! metrics backend directly.

use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

use super::{Segment, SegmentLevel, SegmentType};

/// Label set for the per-segment count series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentCountKey {
    pub collection_id: i64,
    pub partition_id: i64,
    pub segment_type: SegmentType,
    pub index_count: usize,
    pub level: SegmentLevel,
}

/// Point-in-time view of the registry metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Node the series belong to.
    pub node_id: i64,

    /// Registered segments per label set.
    pub segment_counts: Vec<(SegmentCountKey, i64)>,

    /// Distinct collections with at least one registered segment.
    pub collection_count: usize,

    /// Distinct partitions with at least one registered segment.
    pub partition_count: usize,
}

/// Counters and gauges maintained by the segment registry.
#[derive(Debug)]
pub struct SegmentMetrics {
    node_id: i64,
    segment_counts: Mutex<AHashMap<SegmentCountKey, i64>>,
    collection_count: AtomicUsize,
    partition_count: AtomicUsize,
}

impl SegmentMetrics {
    pub fn new(node_id: i64) -> Self {
        SegmentMetrics {
            node_id,
            segment_counts: Mutex::new(AHashMap::new()),
            collection_count: AtomicUsize::new(0),
            partition_count: AtomicUsize::new(0),
        }
    }

    fn key_for(segment: &dyn Segment) -> SegmentCountKey {
        SegmentCountKey {
            collection_id: segment.collection(),
            partition_id: segment.partition(),
            segment_type: segment.segment_type(),
            index_count: segment.indexes().len(),
            level: segment.level(),
        }
    }

    /// Count a segment admitted to the registry.
    pub fn record_admitted(&self, segment: &dyn Segment) {
        let mut counts = self.segment_counts.lock();
        *counts.entry(Self::key_for(segment)).or_insert(0) += 1;
    }

    /// Count a segment released after removal from the registry.
    pub fn record_released(&self, segment: &dyn Segment) {
        let mut counts = self.segment_counts.lock();
        let key = Self::key_for(segment);
        if let Some(count) = counts.get_mut(&key) {
            *count -= 1;
            if *count <= 0 {
                counts.remove(&key);
            }
        }
    }

    /// Refresh the collection and partition cardinality gauges.
    pub fn set_cardinality(&self, collections: usize, partitions: usize) {
        self.collection_count.store(collections, Ordering::Relaxed);
        self.partition_count.store(partitions, Ordering::Relaxed);
    }

    /// Get the current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counts = self.segment_counts.lock();
        let mut segment_counts: Vec<_> =
            counts.iter().map(|(key, count)| (key.clone(), *count)).collect();
        segment_counts.sort_by_key(|(key, _)| (key.collection_id, key.partition_id));

        MetricsSnapshot {
            node_id: self.node_id,
            segment_counts,
            collection_count: self.collection_count.load(Ordering::Relaxed),
            partition_count: self.partition_count.load(Ordering::Relaxed),
        }
    }
}
