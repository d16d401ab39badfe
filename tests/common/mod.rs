//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use framea::segment::pin::PinLock;
use framea::{
    Collection, FieldLoader, FrameaError, IndexDescriptor, LoadInfo, LoadMode, ReleaseScope,
    ResourceUsage, Result, Segment, SegmentId, SegmentLevel, SegmentRef, SegmentType,
};

/// Segment double backed by a `PinLock`, recording every release.
#[derive(Debug)]
pub struct MockSegment {
    id: SegmentId,
    segment_type: SegmentType,
    version: AtomicI64,
    collection_id: i64,
    partition_id: i64,
    channel: String,
    level: SegmentLevel,
    insert_count: i64,
    disk_bytes: u64,
    pin_lock: PinLock,
    releases: Mutex<Vec<ReleaseScope>>,
}

pub struct MockSegmentBuilder {
    segment: MockSegment,
}

impl MockSegment {
    pub fn growing(id: SegmentId) -> MockSegmentBuilder {
        Self::builder(id, SegmentType::Growing)
    }

    pub fn sealed(id: SegmentId) -> MockSegmentBuilder {
        Self::builder(id, SegmentType::Sealed)
    }

    fn builder(id: SegmentId, segment_type: SegmentType) -> MockSegmentBuilder {
        MockSegmentBuilder {
            segment: MockSegment {
                id,
                segment_type,
                version: AtomicI64::new(1),
                collection_id: 1,
                partition_id: 1,
                channel: "dml-0".to_string(),
                level: SegmentLevel::L1,
                insert_count: 1,
                disk_bytes: 0,
                pin_lock: PinLock::new(),
                releases: Mutex::new(Vec::new()),
            },
        }
    }

    /// Releases observed so far, in order.
    pub fn releases(&self) -> Vec<ReleaseScope> {
        self.releases.lock().clone()
    }

    pub fn full_release_count(&self) -> usize {
        self.releases
            .lock()
            .iter()
            .filter(|scope| **scope == ReleaseScope::All)
            .count()
    }

    pub fn data_release_count(&self) -> usize {
        self.releases
            .lock()
            .iter()
            .filter(|scope| **scope == ReleaseScope::Data)
            .count()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_lock.pin_count()
    }

    /// Spin until the segment saw a full release.
    pub fn wait_for_full_release(&self) {
        for _ in 0..500 {
            if self.full_release_count() > 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("segment {} was never fully released", self.id);
    }
}

impl MockSegmentBuilder {
    pub fn version(self, version: i64) -> Self {
        self.segment.version.store(version, Ordering::SeqCst);
        self
    }

    pub fn collection(mut self, collection_id: i64) -> Self {
        self.segment.collection_id = collection_id;
        self
    }

    pub fn partition(mut self, partition_id: i64) -> Self {
        self.segment.partition_id = partition_id;
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.segment.channel = channel.to_string();
        self
    }

    pub fn level(mut self, level: SegmentLevel) -> Self {
        self.segment.level = level;
        self
    }

    pub fn insert_count(mut self, insert_count: i64) -> Self {
        self.segment.insert_count = insert_count;
        self
    }

    pub fn disk_bytes(mut self, disk_bytes: u64) -> Self {
        self.segment.disk_bytes = disk_bytes;
        self
    }

    pub fn build(self) -> Arc<MockSegment> {
        Arc::new(self.segment)
    }

    pub fn build_ref(self) -> SegmentRef {
        self.build()
    }
}

impl Segment for MockSegment {
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
        Vec::new()
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
                    self.releases.lock().push(ReleaseScope::Data);
                });
            }
            ReleaseScope::All => {
                self.pin_lock.exclusive(true, || {
                    self.releases.lock().push(ReleaseScope::All);
                });
            }
        }
    }
}

/// Field loader double with a configurable delay and failure switch.
#[derive(Debug, Default)]
pub struct MockFieldLoader {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
}

impl MockFieldLoader {
    pub fn new() -> Self {
        MockFieldLoader::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        MockFieldLoader {
            delay: Some(delay),
            ..MockFieldLoader::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FieldLoader for MockFieldLoader {
    fn load_sealed_fields(
        &self,
        _collection: &Collection,
        _segment: &dyn Segment,
        _binlog_paths: &[String],
        _row_count: i64,
        mode: LoadMode,
    ) -> Result<()> {
        assert_eq!(mode, LoadMode::Mapped);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(FrameaError::other("simulated binlog fetch failure"));
        }
        Ok(())
    }
}
