//! Composable segment selection predicates.
//!
//! Filters combine conjunctively. Two optional hints let the registry skip
//! whole tables (`segment_type`) or replace table scans with per-id lookups
//! (`segment_ids`); everything else goes through the plain predicate.

use super::{Segment, SegmentId, SegmentLevel, SegmentType};

/// Selection criterion over registered segments.
pub trait SegmentFilter: Send + Sync {
    /// Whether the segment satisfies the criterion.
    fn matches(&self, segment: &dyn Segment) -> bool;

    /// Hint restricting iteration to one table.
    fn segment_type(&self) -> Option<SegmentType> {
        None
    }

    /// Hint replacing table iteration with point lookups.
    fn segment_ids(&self) -> Option<Vec<SegmentId>> {
        None
    }
}

struct FilterFn<F>(F);

impl<F> SegmentFilter for FilterFn<F>
where
    F: Fn(&dyn Segment) -> bool + Send + Sync,
{
    fn matches(&self, segment: &dyn Segment) -> bool {
        (self.0)(segment)
    }
}

struct IdFilter(SegmentId);

impl SegmentFilter for IdFilter {
    fn matches(&self, segment: &dyn Segment) -> bool {
        segment.id() == self.0
    }

    fn segment_ids(&self) -> Option<Vec<SegmentId>> {
        Some(vec![self.0])
    }
}

struct IdSetFilter(Vec<SegmentId>);

impl SegmentFilter for IdSetFilter {
    fn matches(&self, segment: &dyn Segment) -> bool {
        self.0.contains(&segment.id())
    }

    fn segment_ids(&self) -> Option<Vec<SegmentId>> {
        Some(self.0.clone())
    }
}

struct TypeFilter(SegmentType);

impl SegmentFilter for TypeFilter {
    fn matches(&self, segment: &dyn Segment) -> bool {
        segment.segment_type() == self.0
    }

    fn segment_type(&self) -> Option<SegmentType> {
        Some(self.0)
    }
}

/// Select a single segment by id.
pub fn with_id(segment_id: SegmentId) -> Box<dyn SegmentFilter> {
    Box::new(IdFilter(segment_id))
}

/// Select segments whose id is in the given set.
pub fn with_ids(segment_ids: Vec<SegmentId>) -> Box<dyn SegmentFilter> {
    Box::new(IdSetFilter(segment_ids))
}

/// Select segments of one table.
pub fn with_type(segment_type: SegmentType) -> Box<dyn SegmentFilter> {
    Box::new(TypeFilter(segment_type))
}

/// Select segments of one partition.
pub fn with_partition(partition_id: i64) -> Box<dyn SegmentFilter> {
    filter_fn(move |segment| segment.partition() == partition_id)
}

/// Select segments ingested from one shard channel.
pub fn with_channel(channel: impl Into<String>) -> Box<dyn SegmentFilter> {
    let channel = channel.into();
    filter_fn(move |segment| segment.shard() == channel)
}

/// Select segments of one compaction level.
pub fn with_level(level: SegmentLevel) -> Box<dyn SegmentFilter> {
    filter_fn(move |segment| segment.level() == level)
}

/// Skip segments with no inserted rows.
pub fn with_skip_empty() -> Box<dyn SegmentFilter> {
    filter_fn(|segment| segment.insert_count() > 0)
}

/// Wrap an arbitrary predicate as a filter.
pub fn filter_fn<F>(f: F) -> Box<dyn SegmentFilter>
where
    F: Fn(&dyn Segment) -> bool + Send + Sync + 'static,
{
    Box::new(FilterFn(f))
}

/// Whether `segment` satisfies every filter.
pub(crate) fn matches_all(segment: &dyn Segment, filters: &[Box<dyn SegmentFilter>]) -> bool {
    filters.iter().all(|filter| filter.matches(segment))
}

/// Action raising a segment's version to `version` via CAS.
///
/// Retries while the stored version is still below the target; returns
/// false once a concurrent updater has raced ahead.
pub fn increase_version(version: i64) -> impl Fn(&dyn Segment) -> bool {
    move |segment| {
        let mut current = segment.version();
        while current < version {
            if segment.cas_version(current, version) {
                return true;
            }
            current = segment.version();
        }
        log::warn!(
            "segment {} version {} cannot go backwards to {}, skip update",
            segment.id(),
            current,
            version
        );
        false
    }
}
