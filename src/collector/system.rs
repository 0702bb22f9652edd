// System collector - daemon-wide counts and exporter build info

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::Collector;
use crate::metrics::{Emitter, Measurement, MetricCatalog, MetricDesc};
use crate::runtime::{RuntimeClient, SystemInfo};

const COLLECTOR_NAME: &str = "system";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash injected at build time, if any.
pub const COMMIT: &str = match option_env!("EXPORTER_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

pub const BUILD_DATE: &str = match option_env!("EXPORTER_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

/// Collects daemon-level counts (containers by state, images, volumes, networks).
pub struct SystemCollector {
    client: Arc<dyn RuntimeClient>,
    catalog: Arc<MetricCatalog>,
    timeout: Duration,
}

impl SystemCollector {
    pub fn new(client: Arc<dyn RuntimeClient>, catalog: Arc<MetricCatalog>, timeout: Duration) -> Self {
        SystemCollector {
            client,
            catalog,
            timeout,
        }
    }

    fn emit_info(&self, emitter: &mut Emitter, info: &SystemInfo) {
        let c = &self.catalog;

        for (state, count) in [
            ("running", info.containers_running),
            ("paused", info.containers_paused),
            ("stopped", info.containers_stopped),
        ] {
            emitter.emit(&c.docker_containers, count as f64, vec![state.to_string()]);
        }
        emitter.emit(&c.docker_images, info.images as f64, vec![]);
        emitter.emit(&c.docker_volumes, info.volumes as f64, vec![]);
        emitter.emit(&c.docker_networks, info.networks as f64, vec![]);
    }
}

#[async_trait]
impl Collector for SystemCollector {
    fn name(&self) -> &str {
        COLLECTOR_NAME
    }

    fn describe(&self) -> Vec<&Arc<MetricDesc>> {
        self.catalog.system_descs()
    }

    async fn collect(&self) -> Vec<Measurement> {
        let started = Instant::now();
        let c = &self.catalog;
        let mut emitter = Emitter::new();
        let mut errors = 0u64;

        match timeout(self.timeout, self.client.system_info()).await {
            Ok(Ok(info)) => {
                debug!(server_version = %info.server_version, "Collected system info");
                emitter.emit(&c.exporter_up, 1.0, vec![]);
                self.emit_info(&mut emitter, &info);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to collect system info");
                emitter.emit(&c.exporter_up, 0.0, vec![]);
                errors += 1;
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "System info timed out");
                emitter.emit(&c.exporter_up, 0.0, vec![]);
                errors += 1;
            }
        }

        emitter.emit(
            &c.build_info,
            1.0,
            vec![VERSION.to_string(), COMMIT.to_string(), BUILD_DATE.to_string()],
        );

        let collector = vec![COLLECTOR_NAME.to_string()];
        emitter.emit(&c.scrape_duration, started.elapsed().as_secs_f64(), collector.clone());
        emitter.emit(&c.scrape_errors, errors as f64, collector);

        emitter.finish()
    }
}
