//! Seam to the sealed-segment field loading machinery.

use crate::collection::Collection;
use crate::error::Result;
use crate::segment::Segment;

/// How field data is materialised on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Bytes stay on disk and are mapped into the address space.
    #[default]
    Mapped,
    /// Bytes are decoded into anonymous memory.
    InMemory,
}

/// Loads sealed-segment field data from object storage.
///
/// Implementations fetch the binlogs named by the segment's load info,
/// decode them against the collection schema and attach the columns to the
/// segment. The disk cache always requests [`LoadMode::Mapped`] so cached
/// data is disk-resident and cheap to drop again.
pub trait FieldLoader: Send + Sync {
    fn load_sealed_fields(
        &self,
        collection: &Collection,
        segment: &dyn Segment,
        binlog_paths: &[String],
        row_count: i64,
        mode: LoadMode,
    ) -> Result<()>;
}
