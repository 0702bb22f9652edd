// Metric catalog - every descriptor the exporter can emit
//
// Built once at startup and shared read-only by the collectors.

use std::sync::Arc;

use super::MetricDesc;
use crate::labels::CONTAINER_LABEL_NAMES;

/// Immutable table of measurement descriptors.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    // Memory
    pub memory_usage: Arc<MetricDesc>,
    pub memory_limit: Arc<MetricDesc>,
    pub memory_cache: Arc<MetricDesc>,
    pub memory_rss: Arc<MetricDesc>,
    pub memory_swap: Arc<MetricDesc>,
    pub memory_working_set: Arc<MetricDesc>,
    pub memory_failcnt: Arc<MetricDesc>,

    // CPU
    pub cpu_usage_total: Arc<MetricDesc>,
    pub cpu_usage_system: Arc<MetricDesc>,
    pub cpu_usage_user: Arc<MetricDesc>,
    pub cpu_throttled_periods: Arc<MetricDesc>,
    pub cpu_throttled_time: Arc<MetricDesc>,
    pub cpu_online: Arc<MetricDesc>,

    // Network, per interface
    pub network_rx_bytes: Arc<MetricDesc>,
    pub network_tx_bytes: Arc<MetricDesc>,
    pub network_rx_packets: Arc<MetricDesc>,
    pub network_tx_packets: Arc<MetricDesc>,
    pub network_rx_errors: Arc<MetricDesc>,
    pub network_tx_errors: Arc<MetricDesc>,
    pub network_rx_dropped: Arc<MetricDesc>,
    pub network_tx_dropped: Arc<MetricDesc>,

    // Block I/O, per device
    pub fs_read_bytes: Arc<MetricDesc>,
    pub fs_write_bytes: Arc<MetricDesc>,
    pub fs_read_ops: Arc<MetricDesc>,
    pub fs_write_ops: Arc<MetricDesc>,

    pub pids_current: Arc<MetricDesc>,

    // State
    pub last_seen: Arc<MetricDesc>,
    pub start_time: Arc<MetricDesc>,
    pub uptime: Arc<MetricDesc>,
    pub info: Arc<MetricDesc>,
    pub health_status: Arc<MetricDesc>,
    pub restart_count: Arc<MetricDesc>,
    pub exit_code: Arc<MetricDesc>,

    // Daemon
    pub docker_containers: Arc<MetricDesc>,
    pub docker_images: Arc<MetricDesc>,
    pub docker_volumes: Arc<MetricDesc>,
    pub docker_networks: Arc<MetricDesc>,

    // Exporter self-observability
    pub exporter_up: Arc<MetricDesc>,
    pub build_info: Arc<MetricDesc>,
    pub scrape_duration: Arc<MetricDesc>,
    pub scrape_errors: Arc<MetricDesc>,
    pub cache_hits: Arc<MetricDesc>,
    pub cache_misses: Arc<MetricDesc>,
}

fn with_trailing(extra: &[&'static str]) -> Vec<&'static str> {
    CONTAINER_LABEL_NAMES.iter().chain(extra).copied().collect()
}

impl MetricCatalog {
    pub fn new() -> Self {
        let c = &CONTAINER_LABEL_NAMES[..];
        let net = &with_trailing(&["interface"]);
        let dev = &with_trailing(&["device"]);
        let info = &with_trailing(&["container_id", "status", "health_status", "started_at"]);

        MetricCatalog {
            memory_usage: MetricDesc::gauge(
                "container_memory_usage_bytes",
                "Current memory usage in bytes.",
                c,
            ),
            memory_limit: MetricDesc::gauge("container_memory_limit_bytes", "Memory limit in bytes.", c),
            memory_cache: MetricDesc::gauge(
                "container_memory_cache_bytes",
                "Memory used for cache in bytes.",
                c,
            ),
            memory_rss: MetricDesc::gauge("container_memory_rss_bytes", "Resident set size in bytes.", c),
            memory_swap: MetricDesc::gauge("container_memory_swap_bytes", "Swap usage in bytes.", c),
            memory_working_set: MetricDesc::gauge(
                "container_memory_working_set_bytes",
                "Working set size in bytes (usage minus inactive file).",
                c,
            ),
            memory_failcnt: MetricDesc::gauge(
                "container_memory_failcnt",
                "Number of times memory limit was hit.",
                c,
            ),

            cpu_usage_total: MetricDesc::counter(
                "container_cpu_usage_seconds_total",
                "Total CPU time consumed in seconds.",
                c,
            ),
            cpu_usage_system: MetricDesc::counter(
                "container_cpu_system_seconds_total",
                "CPU time in kernel mode in seconds.",
                c,
            ),
            cpu_usage_user: MetricDesc::counter(
                "container_cpu_user_seconds_total",
                "CPU time in user mode in seconds.",
                c,
            ),
            cpu_throttled_periods: MetricDesc::counter(
                "container_cpu_throttling_periods_total",
                "Number of periods with throttling active.",
                c,
            ),
            cpu_throttled_time: MetricDesc::counter(
                "container_cpu_throttled_seconds_total",
                "Total time throttled in seconds.",
                c,
            ),
            cpu_online: MetricDesc::gauge(
                "container_cpu_online",
                "Number of logical CPUs available to the container.",
                c,
            ),

            network_rx_bytes: MetricDesc::counter(
                "container_network_receive_bytes_total",
                "Total bytes received.",
                net,
            ),
            network_tx_bytes: MetricDesc::counter(
                "container_network_transmit_bytes_total",
                "Total bytes transmitted.",
                net,
            ),
            network_rx_packets: MetricDesc::counter(
                "container_network_receive_packets_total",
                "Total packets received.",
                net,
            ),
            network_tx_packets: MetricDesc::counter(
                "container_network_transmit_packets_total",
                "Total packets transmitted.",
                net,
            ),
            network_rx_errors: MetricDesc::counter(
                "container_network_receive_errors_total",
                "Total receive errors.",
                net,
            ),
            network_tx_errors: MetricDesc::counter(
                "container_network_transmit_errors_total",
                "Total transmit errors.",
                net,
            ),
            network_rx_dropped: MetricDesc::counter(
                "container_network_receive_dropped_total",
                "Total received packets dropped.",
                net,
            ),
            network_tx_dropped: MetricDesc::counter(
                "container_network_transmit_dropped_total",
                "Total transmitted packets dropped.",
                net,
            ),

            fs_read_bytes: MetricDesc::counter(
                "container_fs_reads_bytes_total",
                "Total bytes read from disk.",
                dev,
            ),
            fs_write_bytes: MetricDesc::counter(
                "container_fs_writes_bytes_total",
                "Total bytes written to disk.",
                dev,
            ),
            fs_read_ops: MetricDesc::counter("container_fs_reads_total", "Total read operations.", dev),
            fs_write_ops: MetricDesc::counter("container_fs_writes_total", "Total write operations.", dev),

            pids_current: MetricDesc::gauge(
                "container_pids_current",
                "Number of processes running in the container.",
                c,
            ),

            last_seen: MetricDesc::gauge(
                "container_last_seen",
                "Timestamp when container was last seen.",
                c,
            ),
            start_time: MetricDesc::gauge(
                "container_start_time_seconds",
                "Container start time as Unix timestamp.",
                c,
            ),
            uptime: MetricDesc::gauge("container_uptime_seconds", "Container uptime in seconds.", c),
            info: MetricDesc::gauge("container_info", "Container information (value always 1).", info),
            health_status: MetricDesc::gauge(
                "container_health_status",
                "Container health status (0=none, 1=starting, 2=healthy, 3=unhealthy).",
                c,
            ),
            restart_count: MetricDesc::gauge(
                "container_restart_count",
                "Number of times container has been restarted.",
                c,
            ),
            exit_code: MetricDesc::gauge("container_exit_code", "Last exit code of the container.", c),

            docker_containers: MetricDesc::gauge(
                "docker_containers_total",
                "Total number of containers.",
                &["state"],
            ),
            docker_images: MetricDesc::gauge("docker_images_total", "Total number of images.", &[]),
            docker_volumes: MetricDesc::gauge("docker_volumes_total", "Total number of volumes.", &[]),
            docker_networks: MetricDesc::gauge("docker_networks_total", "Total number of networks.", &[]),

            exporter_up: MetricDesc::gauge(
                "exporter_up",
                "Whether the container runtime was reachable.",
                &[],
            ),
            build_info: MetricDesc::gauge(
                "exporter_build_info",
                "Exporter build information.",
                &["version", "commit", "build_date"],
            ),
            scrape_duration: MetricDesc::gauge(
                "exporter_scrape_duration_seconds",
                "Time spent collecting metrics.",
                &["collector"],
            ),
            scrape_errors: MetricDesc::counter(
                "exporter_scrape_errors_total",
                "Number of errors during the last collection.",
                &["collector"],
            ),
            cache_hits: MetricDesc::counter(
                "exporter_cache_hits_total",
                "Total stats cache hits.",
                &[],
            ),
            cache_misses: MetricDesc::counter(
                "exporter_cache_misses_total",
                "Total stats cache misses.",
                &[],
            ),
        }
    }

    /// Descriptors emitted by the container collector.
    pub fn container_descs(&self) -> Vec<&Arc<MetricDesc>> {
        vec![
            &self.memory_usage,
            &self.memory_limit,
            &self.memory_cache,
            &self.memory_rss,
            &self.memory_swap,
            &self.memory_working_set,
            &self.memory_failcnt,
            &self.cpu_usage_total,
            &self.cpu_usage_system,
            &self.cpu_usage_user,
            &self.cpu_throttled_periods,
            &self.cpu_throttled_time,
            &self.cpu_online,
            &self.network_rx_bytes,
            &self.network_tx_bytes,
            &self.network_rx_packets,
            &self.network_tx_packets,
            &self.network_rx_errors,
            &self.network_tx_errors,
            &self.network_rx_dropped,
            &self.network_tx_dropped,
            &self.fs_read_bytes,
            &self.fs_write_bytes,
            &self.fs_read_ops,
            &self.fs_write_ops,
            &self.pids_current,
            &self.last_seen,
            &self.start_time,
            &self.uptime,
            &self.info,
            &self.health_status,
            &self.restart_count,
            &self.exit_code,
            &self.scrape_duration,
            &self.scrape_errors,
            &self.cache_hits,
            &self.cache_misses,
        ]
    }

    /// Descriptors emitted by the system collector.
    pub fn system_descs(&self) -> Vec<&Arc<MetricDesc>> {
        vec![
            &self.docker_containers,
            &self.docker_images,
            &self.docker_volumes,
            &self.docker_networks,
            &self.exporter_up,
            &self.build_info,
            &self.scrape_duration,
            &self.scrape_errors,
        ]
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::new()
    }
}
