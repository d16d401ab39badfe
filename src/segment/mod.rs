//! Segment contract types shared by the registry, the cache and the manager.
//!
//! The segment content itself (columns, indexes, binlog decoding) lives
//! behind the [`Segment`] trait; this crate only drives the lifecycle,
//! lookup and residency of the handles.

pub mod filter;
pub mod metrics;
pub mod pin;
pub mod registry;
pub mod release;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Node-local unique segment identifier.
pub type SegmentId = i64;

/// Kind of a segment hosted by a query node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    /// Still receiving inserts from the message log.
    Growing,
    /// Frozen and indexed, loaded from object storage.
    Sealed,
}

impl SegmentType {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Growing => "growing",
            SegmentType::Sealed => "sealed",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compaction level of a segment.
///
/// L0 segments carry only delete records and are never query-servable;
/// the registry records them but refuses to pin them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentLevel {
    L0,
    L1,
    L2,
}

impl SegmentLevel {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLevel::L0 => "L0",
            SegmentLevel::L1 => "L1",
            SegmentLevel::L2 => "L2",
        }
    }
}

impl fmt::Display for SegmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a segment a release tears down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseScope {
    /// Free loaded field data only; the handle stays usable for reloads.
    Data,
    /// Destroy the handle entirely.
    All,
}

/// Which registry table(s) a removal targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    /// Growing segments only.
    Streaming,
    /// Sealed segments only.
    Historical,
    /// Both tables.
    All,
}

/// Descriptor of one index carried by a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Field the index covers.
    pub field_id: i64,

    /// Identifier of the index build.
    pub index_id: i64,

    /// Index kind, e.g. "HNSW" or "IVF_FLAT".
    pub index_type: String,
}

/// Pointer to the binlog objects backing a sealed segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadInfo {
    /// Segment the descriptor belongs to.
    pub segment_id: SegmentId,

    /// Owning collection.
    pub collection_id: i64,

    /// Owning partition.
    pub partition_id: i64,

    /// Object-storage paths of the field binlogs.
    pub binlog_paths: Vec<String>,

    /// Number of rows the binlogs decode to.
    pub row_count: i64,
}

/// Resource footprint estimate for a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    /// Resident memory attributed to the segment, in bytes.
    pub memory_bytes: u64,

    /// On-disk bytes attributed to the segment (mapped field data).
    pub disk_bytes: u64,
}

/// Contract implemented by query-servable segments.
///
/// Implementations must be internally synchronised: the registry calls
/// every method through a shared reference, possibly from several threads
/// at once. The pinning methods are expected to follow the
/// [`PinLock`](pin::PinLock) contract: `rlock` fails while the segment is
/// being released, `release` drains in-flight pins before tearing down.
pub trait Segment: Send + Sync + fmt::Debug {
    /// Node-local unique identifier.
    fn id(&self) -> SegmentId;

    /// Which table the segment belongs to.
    fn segment_type(&self) -> SegmentType;

    /// Distribution version; admission keeps the highest per id.
    fn version(&self) -> i64;

    /// Compare-and-swap the version. Returns false if `old` is stale.
    fn cas_version(&self, old: i64, new: i64) -> bool;

    /// Owning collection id.
    fn collection(&self) -> i64;

    /// Owning partition id.
    fn partition(&self) -> i64;

    /// Shard (channel) name the segment was ingested from.
    fn shard(&self) -> &str;

    /// Compaction level.
    fn level(&self) -> SegmentLevel;

    /// Number of inserted rows.
    fn insert_count(&self) -> i64;

    /// Descriptors of the indexes carried by the segment.
    fn indexes(&self) -> Vec<IndexDescriptor>;

    /// Estimated resource footprint.
    fn resource_usage(&self) -> ResourceUsage;

    /// Binlog locations and row count for (re)loading field data.
    fn load_info(&self) -> LoadInfo;

    /// Acquire a read pin. Fails while the segment is being released.
    fn rlock(&self) -> Result<()>;

    /// Drop a read pin taken with [`Segment::rlock`].
    fn runlock(&self);

    /// Tear down the segment to the given scope, draining read pins first.
    fn release(&self, scope: ReleaseScope);
}

/// Shared handle to a registered segment.
pub type SegmentRef = Arc<dyn Segment>;
