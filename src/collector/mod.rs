// Collector module - the scrape-collector contract and the registry that runs it
//
// Each collector describes the measurement families it can emit and produces
// a full snapshot on every `collect()` call. The registry runs all registered
// collectors concurrently for one scrape and concatenates their output.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::metrics::{Measurement, MetricDesc};

pub mod container;
pub mod system;

pub use container::ContainerCollector;
pub use system::SystemCollector;

/// Pull-style collector: static descriptors plus a per-scrape snapshot.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs and in the `collector` self-metric label.
    fn name(&self) -> &str;

    /// Every descriptor this collector may emit.
    fn describe(&self) -> Vec<&Arc<MetricDesc>>;

    /// Runs one collection cycle. Never fails: errors degrade the output
    /// and are reported through self-metrics.
    async fn collect(&self) -> Vec<Measurement>;
}

/// Set of collectors served from one endpoint.
#[derive(Default, Clone)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        debug!(collector = collector.name(), "Registered collector");
        self.collectors.push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Descriptors of all collectors, deduplicated by metric name.
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        let mut seen = std::collections::HashSet::new();
        self.collectors
            .iter()
            .flat_map(|c| c.describe())
            .filter(|d| seen.insert(d.name().to_string()))
            .cloned()
            .collect()
    }

    /// Runs every collector once and returns the combined snapshot.
    pub async fn gather(&self) -> Vec<Measurement> {
        join_all(self.collectors.iter().map(|c| c.collect()))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StatsCache;
    use crate::config::FiltersConfig;
    use crate::filter::Filter;
    use crate::metrics::MetricCatalog;
    use crate::runtime::SystemInfo;
    use crate::testing::{resource, MockRuntime};
    use std::time::Duration;

    fn registry(mock: MockRuntime) -> Registry {
        let client: Arc<MockRuntime> = Arc::new(mock);
        let catalog = Arc::new(MetricCatalog::new());

        let mut registry = Registry::new();
        registry.register(Arc::new(ContainerCollector::new(
            client.clone(),
            Arc::new(Filter::compile(&FiltersConfig::default()).unwrap()),
            Arc::new(StatsCache::new(Duration::from_secs(30), true)),
            catalog.clone(),
            Duration::from_secs(5),
            4,
        )));
        registry.register(Arc::new(SystemCollector::new(
            client,
            catalog,
            Duration::from_secs(5),
        )));
        registry
    }

    #[tokio::test]
    async fn test_gather_combines_collectors() {
        let mut mock = MockRuntime::new().with_running(resource("c1", "web", "nginx", "running"), 1, 2);
        mock.system_info = Some(SystemInfo {
            containers_running: 1,
            ..Default::default()
        });
        let registry = registry(mock);

        let ms = registry.gather().await;

        assert_eq!(registry.len(), 2);
        assert!(ms.iter().any(|m| m.name() == "container_memory_usage_bytes"));
        assert!(ms.iter().any(|m| m.name() == "docker_containers_total"));

        let collectors: Vec<&str> = ms
            .iter()
            .filter(|m| m.name() == "exporter_scrape_duration_seconds")
            .filter_map(|m| m.label("collector"))
            .collect();
        assert_eq!(collectors.len(), 2);
        assert!(collectors.contains(&"container") && collectors.contains(&"system"));
    }

    #[test]
    fn test_describe_dedupes_shared_self_metrics() {
        let registry = registry(MockRuntime::new());

        let descs = registry.describe();

        let duration = descs
            .iter()
            .filter(|d| d.name() == "exporter_scrape_duration_seconds")
            .count();
        assert_eq!(duration, 1);
        assert!(descs.iter().any(|d| d.name() == "docker_volumes_total"));
    }

    #[test]
    fn test_empty_registry() {
        assert!(Registry::new().is_empty());
    }
}
