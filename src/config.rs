//! Runtime configuration for the segment manager.

use serde::{Deserialize, Serialize};

/// Tunables bound once at manager construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Disk budget for cached sealed-segment data, in bytes.
    pub disk_capacity_bytes: u64,

    /// Number of worker threads draining the deferred-release queue.
    pub release_worker_threads: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            disk_capacity_bytes: 64 * 1024 * 1024 * 1024, // 64GiB
            release_worker_threads: 2,
        }
    }
}
