// Raw wire models mirroring the Docker Engine API JSON
//
// These are deliberately lenient: every scalar is optional and the cgroup
// memory counters are kept as an open key/value map, because their field set
// differs between cgroup v1 and v2. The normalizer resolves the variants.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Response of `GET /containers/{id}/stats?stream=false`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStats {
    pub read: Option<String>,
    pub pids_stats: Option<RawPidsStats>,
    pub networks: Option<HashMap<String, RawNetworkStats>>,
    pub memory_stats: Option<RawMemoryStats>,
    pub blkio_stats: Option<RawBlkioStats>,
    pub cpu_stats: Option<RawCpuStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPidsStats {
    pub current: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawNetworkStats {
    pub rx_bytes: Option<u64>,
    pub rx_packets: Option<u64>,
    pub rx_errors: Option<u64>,
    pub rx_dropped: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub tx_packets: Option<u64>,
    pub tx_errors: Option<u64>,
    pub tx_dropped: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMemoryStats {
    pub usage: Option<u64>,
    pub limit: Option<u64>,
    pub failcnt: Option<u64>,

    /// cgroup memory.stat counters; keys differ between v1 and v2
    #[serde(deserialize_with = "counter_map")]
    pub stats: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCpuStats {
    pub cpu_usage: Option<RawCpuUsage>,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u64>,
    pub throttling_data: Option<RawThrottlingData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCpuUsage {
    pub total_usage: Option<u64>,
    pub usage_in_kernelmode: Option<u64>,
    pub usage_in_usermode: Option<u64>,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawThrottlingData {
    pub periods: Option<u64>,
    pub throttled_periods: Option<u64>,
    pub throttled_time: Option<u64>,
}

/// Block I/O rows. Read and write arrive as separate rows per device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBlkioStats {
    pub io_service_bytes_recursive: Option<Vec<RawBlkioEntry>>,
    pub io_serviced_recursive: Option<Vec<RawBlkioEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBlkioEntry {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub op: Option<String>,
    pub value: Option<u64>,
}

/// Response of `GET /containers/{id}/json`, reduced to what the exporter reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawDetail {
    pub id: Option<String>,
    pub name: Option<String>,
    pub restart_count: Option<i64>,
    pub state: Option<RawState>,
    pub config: Option<RawConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawState {
    pub status: Option<String>,
    pub exit_code: Option<i64>,
    pub started_at: Option<String>,
    pub health: Option<RawHealth>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawHealth {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawConfig {
    pub image: Option<String>,
    pub labels: Option<HashMap<String, String>>,
}

/// One entry of `GET /containers/json?all=true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawSummary {
    pub id: Option<String>,
    pub names: Option<Vec<String>>,
    pub image: Option<String>,
    pub labels: Option<HashMap<String, String>>,
    pub state: Option<String>,
}

// Keeps only entries with a non-negative integer value; nulls and
// non-numeric values are dropped instead of failing the whole decode.
fn counter_map<'de, D>(deserializer: D) -> Result<HashMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| value.as_u64().map(|v| (key, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_counter_map_drops_nulls() {
        let json = r#"{"usage": 100, "stats": {"rss": 10, "hierarchical_memsw_limit": null, "bogus": "x"}}"#;
        let mem: RawMemoryStats = serde_json::from_str(json).unwrap();

        assert_eq!(mem.usage, Some(100));
        assert_eq!(mem.stats.get("rss"), Some(&10));
        assert_eq!(mem.stats.len(), 1);
    }

    #[test]
    fn test_empty_stats_object_decodes() {
        // Stopped containers report mostly-empty stats
        let stats: RawStats =
            serde_json::from_str(r#"{"read": "0001-01-01T00:00:00Z", "memory_stats": {}, "networks": null}"#)
                .unwrap();
        assert!(stats.networks.is_none());
        assert!(stats.memory_stats.unwrap().stats.is_empty());
    }

    #[test]
    fn test_detail_decodes_pascal_case() {
        let json = r#"{
            "Id": "abc",
            "Name": "/web",
            "RestartCount": 2,
            "State": {"Status": "running", "ExitCode": 0, "StartedAt": "2024-01-15T10:30:00Z", "Health": null},
            "Config": {"Image": "nginx:latest", "Labels": {"a": "b"}}
        }"#;
        let detail: RawDetail = serde_json::from_str(json).unwrap();

        assert_eq!(detail.name.as_deref(), Some("/web"));
        assert_eq!(detail.restart_count, Some(2));
        let state = detail.state.unwrap();
        assert_eq!(state.status.as_deref(), Some("running"));
        assert!(state.health.is_none());
    }
}
