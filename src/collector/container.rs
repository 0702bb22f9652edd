// Container collector - the per-scrape collection cycle
//
// One `collect()` call lists containers, filters them, serves cache hits,
// fetches the rest under a bounded permit pool and a single cycle deadline,
// then emits state metrics for every target and resource metrics for every
// container whose stats were obtained. Failures stay local to the container
// they belong to and surface only through the error self-metric.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant as Deadline};
use tracing::{debug, error, warn};

use super::Collector;
use crate::cache::StatsCache;
use crate::filter::Filter;
use crate::labels::ContainerLabels;
use crate::metrics::{Emitter, Measurement, MetricCatalog, MetricDesc, NANOSECONDS_TO_SECONDS};
use crate::runtime::{ClientError, Resource, RuntimeClient};
use crate::stats::{normalize, Stats};

const COLLECTOR_NAME: &str = "container";

/// Fetch orchestrator and emitter for per-container metrics.
pub struct ContainerCollector {
    client: Arc<dyn RuntimeClient>,
    filter: Arc<Filter>,
    cache: Arc<StatsCache>,
    catalog: Arc<MetricCatalog>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ContainerCollector {
    /// Creates a new container collector.
    ///
    /// # Arguments
    /// * `client` - Runtime the containers are listed and fetched from
    /// * `filter` - Compiled inclusion/exclusion policy
    /// * `cache` - Stats cache shared across scrapes
    /// * `catalog` - Descriptor table the measurements are built against
    /// * `timeout` - Deadline for one whole cycle (list plus every fetch)
    /// * `max_concurrent` - Size of the fetch permit pool; values below 1 are raised to 1
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        filter: Arc<Filter>,
        cache: Arc<StatsCache>,
        catalog: Arc<MetricCatalog>,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        ContainerCollector {
            client,
            filter,
            cache,
            catalog,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Runs list, filter, cache check, fetch and emission for one cycle.
    ///
    /// # Returns
    /// Number of errors encountered (a failed list counts once, as does
    /// every failed fetch).
    async fn run_cycle(&self, deadline: Deadline, emitter: &mut Emitter) -> u64 {
        let resources = match timeout_at(deadline, self.client.list()).await {
            Ok(Ok(resources)) => resources,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to list containers");
                return 1;
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "Listing containers timed out");
                return 1;
            }
        };

        let targets: Vec<Resource> = resources
            .into_iter()
            .filter(|r| self.filter.matches(r))
            .collect();

        debug!(targets = targets.len(), "Collecting container metrics");

        let mut stats: HashMap<String, Stats> = HashMap::new();
        let mut tasks = JoinSet::new();

        for resource in targets.iter().filter(|r| r.is_running()) {
            if let Some(cached) = self.cache.get(&resource.id) {
                stats.insert(resource.id.clone(), cached);
                continue;
            }

            tasks.spawn(fetch_one(
                Arc::clone(&self.client),
                Arc::clone(&self.permits),
                resource.id.clone(),
                deadline,
            ));
        }

        let mut errors = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(fetched))) => {
                    self.cache.set(id.clone(), fetched.clone());
                    stats.insert(id, fetched);
                }
                Ok((id, Err(e))) => {
                    warn!(container = %id, error = %e, "Failed to fetch container stats");
                    errors += 1;
                }
                Err(e) => {
                    error!(error = %e, "Stats fetch task failed");
                    errors += 1;
                }
            }
        }

        for resource in &targets {
            let labels = ContainerLabels::extract(resource);
            self.emit_state(emitter, resource, &labels);

            if let Some(s) = stats.get(&resource.id) {
                self.emit_resource(emitter, s, &labels);
            }
        }

        errors
    }

    /// State metrics, derived from the list-time snapshot only.
    fn emit_state(&self, emitter: &mut Emitter, resource: &Resource, labels: &ContainerLabels) {
        let c = &self.catalog;
        let now = Utc::now();

        emitter.emit(&c.last_seen, now.timestamp() as f64, labels.values());

        if let Some(started) = resource.started_at {
            emitter.emit(&c.start_time, started.timestamp() as f64, labels.values());

            let uptime = (now - started).num_milliseconds().max(0) as f64 / 1000.0;
            emitter.emit(&c.uptime, uptime, labels.values());
        }

        let started_at = resource
            .started_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        emitter.emit(
            &c.info,
            1.0,
            labels.values_with(&[
                resource.short_id(),
                resource.status.as_str(),
                resource.health.as_str(),
                started_at.as_str(),
            ]),
        );

        emitter.emit(&c.health_status, resource.health.as_gauge(), labels.values());
        emitter.emit(&c.restart_count, resource.restart_count as f64, labels.values());
        emitter.emit(&c.exit_code, resource.exit_code as f64, labels.values());
    }

    /// Memory, CPU, network, block I/O and process metrics.
    fn emit_resource(&self, emitter: &mut Emitter, stats: &Stats, labels: &ContainerLabels) {
        let c = &self.catalog;
        let values = labels.values();

        let mem = &stats.memory;
        for (desc, value) in [
            (&c.memory_usage, mem.usage),
            (&c.memory_limit, mem.limit),
            (&c.memory_cache, mem.cache),
            (&c.memory_rss, mem.rss),
            (&c.memory_swap, mem.swap),
            (&c.memory_working_set, mem.working_set),
            (&c.memory_failcnt, mem.failcnt),
        ] {
            emitter.emit(desc, value as f64, values.clone());
        }

        let cpu = &stats.cpu;
        let seconds = |ns: u64| ns as f64 * NANOSECONDS_TO_SECONDS;
        emitter.emit(&c.cpu_usage_total, seconds(cpu.total_ns), values.clone());
        emitter.emit(&c.cpu_usage_system, seconds(cpu.kernel_ns), values.clone());
        emitter.emit(&c.cpu_usage_user, seconds(cpu.user_ns), values.clone());
        emitter.emit(&c.cpu_throttled_periods, cpu.throttled_periods as f64, values.clone());
        emitter.emit(&c.cpu_throttled_time, seconds(cpu.throttled_ns), values.clone());
        emitter.emit(&c.cpu_online, cpu.online_cpus as f64, values.clone());

        for (iface, net) in &stats.networks {
            let with_iface = labels.values_with(&[iface.as_str()]);
            for (desc, value) in [
                (&c.network_rx_bytes, net.rx_bytes),
                (&c.network_tx_bytes, net.tx_bytes),
                (&c.network_rx_packets, net.rx_packets),
                (&c.network_tx_packets, net.tx_packets),
                (&c.network_rx_errors, net.rx_errors),
                (&c.network_tx_errors, net.tx_errors),
                (&c.network_rx_dropped, net.rx_dropped),
                (&c.network_tx_dropped, net.tx_dropped),
            ] {
                emitter.emit(desc, value as f64, with_iface.clone());
            }
        }

        for (device, io) in &stats.block_io {
            let with_device = labels.values_with(&[device.as_str()]);
            for (desc, value) in [
                (&c.fs_read_bytes, io.read_bytes),
                (&c.fs_write_bytes, io.write_bytes),
                (&c.fs_read_ops, io.read_ops),
                (&c.fs_write_ops, io.write_ops),
            ] {
                emitter.emit(desc, value as f64, with_device.clone());
            }
        }

        emitter.emit(&c.pids_current, stats.pids as f64, values);
    }

    fn emit_self(&self, emitter: &mut Emitter, elapsed: Duration, errors: u64) {
        let c = &self.catalog;
        let collector = vec![COLLECTOR_NAME.to_string()];

        emitter.emit(&c.scrape_duration, elapsed.as_secs_f64(), collector.clone());
        emitter.emit(&c.scrape_errors, errors as f64, collector);
        emitter.emit(&c.cache_hits, self.cache.hits() as f64, vec![]);
        emitter.emit(&c.cache_misses, self.cache.misses() as f64, vec![]);
    }
}

/// Fetches and normalizes one container's stats.
///
/// The permit is held for the duration of the runtime call and released when
/// the future completes or is dropped at the deadline.
async fn fetch_one(
    client: Arc<dyn RuntimeClient>,
    permits: Arc<Semaphore>,
    id: String,
    deadline: Deadline,
) -> (String, Result<Stats, ClientError>) {
    let fetch = async {
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| ClientError::Unavailable("fetch permit pool closed".into()))?;

        let (raw, detail) = client.fetch_stats(&id).await?;
        Ok::<_, ClientError>(normalize(&raw, &detail))
    };

    let result = timeout_at(deadline, fetch)
        .await
        .unwrap_or(Err(ClientError::Timeout));

    (id, result)
}

#[async_trait]
impl Collector for ContainerCollector {
    fn name(&self) -> &str {
        COLLECTOR_NAME
    }

    fn describe(&self) -> Vec<&Arc<MetricDesc>> {
        self.catalog.container_descs()
    }

    async fn collect(&self) -> Vec<Measurement> {
        let started = Instant::now();
        let deadline = Deadline::now() + self.timeout;
        let mut emitter = Emitter::new();

        let errors = self.run_cycle(deadline, &mut emitter).await;

        self.cache.evict_stale();

        self.emit_self(&mut emitter, started.elapsed(), errors);

        debug!(
            measurements = emitter.len(),
            dropped = emitter.dropped(),
            errors,
            "Container collection finished"
        );

        emitter.finish()
    }
}
