// Normalizer - converts one raw stats + inspect pair into a `Stats` record
//
// Total by construction: missing sub-structures and counters default to
// zero, optional identity fields are omitted, and cgroup v1/v2 naming
// differences are resolved by preferring the primary key over the legacy one.

use std::collections::{BTreeMap, HashMap};

use super::{BlockIoStats, CpuStats, MemoryStats, NetworkStats, Stats};
use crate::runtime::raw::{RawBlkioStats, RawCpuStats, RawMemoryStats, RawNetworkStats};
use crate::runtime::{parse_timestamp, trim_leading_slash, Health, RawDetail, RawStats};

/// Builds a normalized `Stats` from the runtime's raw responses.
///
/// # Arguments
/// * `raw` - Decoded one-shot stats snapshot
/// * `detail` - Decoded inspect response for the same container
///
/// # Returns
/// A fully populated `Stats`. There is no error path: absent numeric fields
/// become zero, an unparsable timestamp leaves the field at its zero value.
pub fn normalize(raw: &RawStats, detail: &RawDetail) -> Stats {
    let mut stats = Stats {
        timestamp: raw
            .read
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default(),
        ..Default::default()
    };

    apply_identity(&mut stats, detail);

    if let Some(memory) = &raw.memory_stats {
        stats.memory = memory_stats(memory);
    }
    if let Some(cpu) = &raw.cpu_stats {
        stats.cpu = cpu_stats(cpu);
    }
    if let Some(networks) = &raw.networks {
        stats.networks = network_stats(networks);
    }
    if let Some(blkio) = &raw.blkio_stats {
        stats.block_io = block_io_stats(blkio);
    }
    stats.pids = raw
        .pids_stats
        .as_ref()
        .and_then(|p| p.current)
        .unwrap_or(0);

    stats
}

fn apply_identity(stats: &mut Stats, detail: &RawDetail) {
    stats.id = detail.id.clone().unwrap_or_default();
    stats.name = trim_leading_slash(detail.name.as_deref().unwrap_or_default()).to_string();
    stats.restart_count = detail.restart_count.unwrap_or(0).max(0) as u64;

    if let Some(config) = &detail.config {
        stats.image = config.image.clone().unwrap_or_default();
        stats.labels = config.labels.clone().unwrap_or_default();
    }

    if let Some(state) = &detail.state {
        stats.status = state.status.clone().unwrap_or_default();
        stats.exit_code = state.exit_code.unwrap_or(0);
        stats.started_at = state.started_at.as_deref().and_then(parse_timestamp);
        stats.health = state
            .health
            .as_ref()
            .and_then(|h| h.status.as_deref())
            .and_then(Health::parse);
    }
}

fn memory_stats(mem: &RawMemoryStats) -> MemoryStats {
    let usage = mem.usage.unwrap_or(0);

    // v1 reports "cache"/"rss", v2 reports "file"/"anon"
    let counter = |primary: &str, legacy: &str| -> u64 {
        mem.stats
            .get(primary)
            .or_else(|| mem.stats.get(legacy))
            .copied()
            .unwrap_or(0)
    };

    // Working set is what the OOM killer looks at
    let inactive_file = counter("inactive_file", "total_inactive_file");
    let working_set = if usage > inactive_file {
        usage - inactive_file
    } else {
        usage
    };

    MemoryStats {
        usage,
        limit: mem.limit.unwrap_or(0),
        cache: counter("cache", "file"),
        rss: counter("rss", "anon"),
        swap: mem.stats.get("swap").copied().unwrap_or(0),
        working_set,
        failcnt: mem.failcnt.unwrap_or(0),
    }
}

fn cpu_stats(cpu: &RawCpuStats) -> CpuStats {
    let usage = cpu.cpu_usage.as_ref();
    let throttling = cpu.throttling_data.as_ref();

    // Older daemons omit online_cpus; the per-CPU vector length is the fallback
    let online_cpus = cpu
        .online_cpus
        .or_else(|| {
            usage
                .and_then(|u| u.percpu_usage.as_ref())
                .map(|per_cpu| per_cpu.len() as u64)
        })
        .unwrap_or(0);

    CpuStats {
        total_ns: usage.and_then(|u| u.total_usage).unwrap_or(0),
        kernel_ns: usage.and_then(|u| u.usage_in_kernelmode).unwrap_or(0),
        user_ns: usage.and_then(|u| u.usage_in_usermode).unwrap_or(0),
        throttled_periods: throttling.and_then(|t| t.throttled_periods).unwrap_or(0),
        throttled_ns: throttling.and_then(|t| t.throttled_time).unwrap_or(0),
        online_cpus: u32::try_from(online_cpus).unwrap_or(u32::MAX),
    }
}

fn network_stats(raw: &HashMap<String, RawNetworkStats>) -> BTreeMap<String, NetworkStats> {
    let mut networks: BTreeMap<String, NetworkStats> = BTreeMap::new();

    for (iface, net) in raw {
        let entry = networks.entry(iface.clone()).or_default();
        entry.rx_bytes += net.rx_bytes.unwrap_or(0);
        entry.tx_bytes += net.tx_bytes.unwrap_or(0);
        entry.rx_packets += net.rx_packets.unwrap_or(0);
        entry.tx_packets += net.tx_packets.unwrap_or(0);
        entry.rx_errors += net.rx_errors.unwrap_or(0);
        entry.tx_errors += net.tx_errors.unwrap_or(0);
        entry.rx_dropped += net.rx_dropped.unwrap_or(0);
        entry.tx_dropped += net.tx_dropped.unwrap_or(0);
    }

    networks
}

#[derive(Clone, Copy)]
enum Direction {
    Read,
    Write,
}

fn direction(op: Option<&str>) -> Option<Direction> {
    match op {
        Some(op) if op.eq_ignore_ascii_case("read") => Some(Direction::Read),
        Some(op) if op.eq_ignore_ascii_case("write") => Some(Direction::Write),
        _ => None,
    }
}

fn block_io_stats(bio: &RawBlkioStats) -> BTreeMap<String, BlockIoStats> {
    let mut devices: BTreeMap<String, BlockIoStats> = BTreeMap::new();

    for entry in bio.io_service_bytes_recursive.iter().flatten() {
        let device = devices.entry(device_key(entry.major, entry.minor)).or_default();
        match direction(entry.op.as_deref()) {
            Some(Direction::Read) => device.read_bytes = entry.value.unwrap_or(0),
            Some(Direction::Write) => device.write_bytes = entry.value.unwrap_or(0),
            None => {}
        }
    }

    for entry in bio.io_serviced_recursive.iter().flatten() {
        let device = devices.entry(device_key(entry.major, entry.minor)).or_default();
        match direction(entry.op.as_deref()) {
            Some(Direction::Read) => device.read_ops = entry.value.unwrap_or(0),
            Some(Direction::Write) => device.write_ops = entry.value.unwrap_or(0),
            None => {}
        }
    }

    devices
}

fn device_key(major: Option<u64>, minor: Option<u64>) -> String {
    format!("{}:{}", major.unwrap_or(0), minor.unwrap_or(0))
}
