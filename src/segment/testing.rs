//! Stub segment implementation for unit tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::pin::PinLock;
use super::{
    IndexDescriptor, LoadInfo, ReleaseScope, ResourceUsage, Segment, SegmentId, SegmentLevel,
    SegmentRef, SegmentType,
};
use crate::error::Result;

/// In-memory segment stub with a builder-style constructor.
#[derive(Debug)]
pub(crate) struct StubSegment {
    id: SegmentId,
    segment_type: SegmentType,
    version: AtomicI64,
    collection_id: i64,
    partition_id: i64,
    channel: String,
    level: SegmentLevel,
    insert_count: i64,
    disk_bytes: u64,
    indexes: Vec<IndexDescriptor>,
    pin_lock: PinLock,
    data_releases: AtomicUsize,
    full_releases: AtomicUsize,
}

pub(crate) struct StubSegmentBuilder {
    segment: StubSegment,
}

impl StubSegment {
    pub(crate) fn growing(id: SegmentId) -> StubSegmentBuilder {
        Self::builder(id, SegmentType::Growing)
    }

    pub(crate) fn sealed(id: SegmentId) -> StubSegmentBuilder {
        Self::builder(id, SegmentType::Sealed)
    }

    fn builder(id: SegmentId, segment_type: SegmentType) -> StubSegmentBuilder {
        StubSegmentBuilder {
            segment: StubSegment {
                id,
                segment_type,
                version: AtomicI64::new(1),
                collection_id: 1,
                partition_id: 1,
                channel: "dml-0".to_string(),
                level: SegmentLevel::L1,
                insert_count: 1,
                disk_bytes: 0,
                indexes: Vec::new(),
                pin_lock: PinLock::new(),
                data_releases: AtomicUsize::new(0),
                full_releases: AtomicUsize::new(0),
            },
        }
    }

    pub(crate) fn data_release_count(&self) -> usize {
        self.data_releases.load(Ordering::SeqCst)
    }

    pub(crate) fn full_release_count(&self) -> usize {
        self.full_releases.load(Ordering::SeqCst)
    }

    pub(crate) fn pin_count(&self) -> u32 {
        self.pin_lock.pin_count()
    }
}

impl StubSegmentBuilder {
    pub(crate) fn version(mut self, version: i64) -> Self {
        self.segment.version = AtomicI64::new(version);
        self
    }

    pub(crate) fn collection(mut self, collection_id: i64) -> Self {
        self.segment.collection_id = collection_id;
        self
    }

    pub(crate) fn partition(mut self, partition_id: i64) -> Self {
        self.segment.partition_id = partition_id;
        self
    }

    pub(crate) fn channel(mut self, channel: &str) -> Self {
        self.segment.channel = channel.to_string();
        self
    }

    pub(crate) fn level(mut self, level: SegmentLevel) -> Self {
        self.segment.level = level;
        self
    }

    pub(crate) fn insert_count(mut self, insert_count: i64) -> Self {
        self.segment.insert_count = insert_count;
        self
    }

    pub(crate) fn disk_bytes(mut self, disk_bytes: u64) -> Self {
        self.segment.disk_bytes = disk_bytes;
        self
    }

    pub(crate) fn build(self) -> Arc<StubSegment> {
        Arc::new(self.segment)
    }

    pub(crate) fn build_ref(self) -> SegmentRef {
        self.build()
    }
}

impl Segment for StubSegment {
    fn id(&self) -> SegmentId {
        self.id
    }

    fn segment_type(&self) -> SegmentType {
        self.segment_type
    }

    fn version(&self) -> i64 {
        self.version.load(Ordering::SeqCst)
    }

    fn cas_version(&self, old: i64, new: i64) -> bool {
        self.version
            .compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn collection(&self) -> i64 {
        self.collection_id
    }

    fn partition(&self) -> i64 {
        self.partition_id
    }

    fn shard(&self) -> &str {
        &self.channel
    }

    fn level(&self) -> SegmentLevel {
        self.level
    }

    fn insert_count(&self) -> i64 {
        self.insert_count
    }

    fn indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes.clone()
    }

    fn resource_usage(&self) -> ResourceUsage {
        ResourceUsage {
            memory_bytes: 0,
            disk_bytes: self.disk_bytes,
        }
    }

    fn load_info(&self) -> LoadInfo {
        LoadInfo {
            segment_id: self.id,
            collection_id: self.collection_id,
            partition_id: self.partition_id,
            binlog_paths: vec![format!("binlog/{}/0", self.id)],
            row_count: self.insert_count,
        }
    }

    fn rlock(&self) -> Result<()> {
        self.pin_lock.pin(self.id)
    }

    fn runlock(&self) {
        self.pin_lock.unpin();
    }

    fn release(&self, scope: ReleaseScope) {
        match scope {
            ReleaseScope::Data => {
                self.pin_lock.exclusive(false, || {
                    self.data_releases.fetch_add(1, Ordering::SeqCst);
                });
            }
            ReleaseScope::All => {
                self.pin_lock.exclusive(true, || {
                    self.full_releases.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
    }
}
