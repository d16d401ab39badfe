//! # Framea
//!
//! The node-local segment view of a vector search query node.
//!
//! ## Features
//!
//! - Versioned replace-or-reject admission of growing and sealed segments
//! - Filtered lookup with read-pinning, so queries observe a stable set
//! - Disk-budgeted sealed-segment cache with lazy scavenging
//! - At-most-one concurrent load per segment via single flight
//! - Deferred release through a drainable worker pool

pub mod cache;
pub mod collection;
pub mod config;
mod error;
pub mod loader;
pub mod manager;
pub mod segment;

// Re-exports for the public API
pub use cache::BoundedDiskCache;
pub use collection::{Collection, CollectionRegistry, CollectionSchema, FieldSchema};
pub use config::ManagerConfig;
pub use error::{FrameaError, Result};
pub use loader::{FieldLoader, LoadMode};
pub use manager::Manager;
pub use segment::registry::SegmentRegistry;
pub use segment::{
    DataScope, IndexDescriptor, LoadInfo, ReleaseScope, ResourceUsage, Segment, SegmentId,
    SegmentLevel, SegmentRef, SegmentType,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
