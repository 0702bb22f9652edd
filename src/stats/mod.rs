// Stats module - canonical per-container measurement bundle
//
// `Stats` is what the rest of the pipeline works with. It is produced by
// `normalize()` from the runtime's raw stats + inspect pair, cached between
// scrapes, and consumed by the container collector at emission time.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::runtime::Health;

mod normalize;

pub use normalize::normalize;

/// Memory counters, all in bytes except `failcnt`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStats {
    pub usage: u64,
    pub limit: u64,
    pub cache: u64,
    pub rss: u64,
    pub swap: u64,

    /// `usage - inactive_file`, clamped to `usage`
    pub working_set: u64,

    /// Number of times the memory limit was hit
    pub failcnt: u64,
}

/// CPU counters. Time values stay in raw cumulative nanoseconds; conversion
/// to seconds happens only at emission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStats {
    pub total_ns: u64,
    pub kernel_ns: u64,
    pub user_ns: u64,
    pub throttled_periods: u64,
    pub throttled_ns: u64,
    pub online_cpus: u32,
}

/// Per-interface network counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

/// Per-device block I/O counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockIoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

/// Normalized point-in-time stats for one running container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub memory: MemoryStats,
    pub cpu: CpuStats,

    /// Keyed by interface name
    pub networks: BTreeMap<String, NetworkStats>,

    /// Keyed by "major:minor"
    pub block_io: BTreeMap<String, BlockIoStats>,

    pub pids: u64,

    // Identity copied from the inspect detail
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub status: String,
    pub health: Option<Health>,
    pub started_at: Option<DateTime<Utc>>,
    pub restart_count: u64,
    pub exit_code: i64,

    /// When the runtime captured the snapshot; the Unix epoch if unparsable
    pub timestamp: DateTime<Utc>,
}
