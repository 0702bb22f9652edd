// In-memory runtime double used by collector and server tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::runtime::raw::{RawConfig, RawCpuStats, RawCpuUsage, RawMemoryStats, RawState};
use crate::runtime::{
    ClientError, Health, LifecycleState, RawDetail, RawStats, Resource, RuntimeClient, SystemInfo,
};

#[derive(Default)]
pub struct MockRuntime {
    pub resources: Vec<Resource>,
    pub stats: HashMap<String, (RawStats, RawDetail)>,
    pub failing: HashSet<String>,
    pub list_fails: bool,
    pub list_delay: Duration,
    pub ping_fails: bool,
    pub system_info: Option<SystemInfo>,
    pub fetch_delay: Duration,

    pub fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    listed: AtomicBool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a running container whose stats report the given memory usage and limit.
    pub fn with_running(mut self, resource: Resource, usage: u64, limit: u64) -> Self {
        let raw = raw_stats(usage, limit);
        let detail = raw_detail(&resource);
        self.stats.insert(resource.id.clone(), (raw, detail));
        self.resources.push(resource);
        self
    }

    pub fn with_stopped(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn failing_fetch(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn was_listed(&self) -> bool {
        self.listed.load(Ordering::SeqCst)
    }
}

// Decrements the in-flight gauge even if the fetch future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn list(&self) -> Result<Vec<Resource>, ClientError> {
        self.listed.store(true, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if self.list_fails {
            return Err(ClientError::Unavailable("connection refused".into()));
        }
        Ok(self.resources.clone())
    }

    async fn fetch_stats(&self, id: &str) -> Result<(RawStats, RawDetail), ClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        if self.failing.contains(id) {
            return Err(ClientError::Unavailable(format!("stats for {id} failed")));
        }
        self.stats
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn ping(&self) -> Result<(), ClientError> {
        if self.ping_fails {
            return Err(ClientError::Unavailable("daemon down".into()));
        }
        Ok(())
    }

    async fn system_info(&self) -> Result<SystemInfo, ClientError> {
        self.system_info
            .clone()
            .ok_or_else(|| ClientError::Unavailable("info unavailable".into()))
    }
}

pub fn resource(id: &str, name: &str, image: &str, state: &str) -> Resource {
    Resource {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        labels: HashMap::new(),
        state: LifecycleState::from_docker(state),
        status: state.to_string(),
        health: Health::None,
        restart_count: 0,
        exit_code: 0,
        started_at: None,
    }
}

pub fn raw_stats(usage: u64, limit: u64) -> RawStats {
    RawStats {
        memory_stats: Some(RawMemoryStats {
            usage: Some(usage),
            limit: Some(limit),
            ..Default::default()
        }),
        cpu_stats: Some(RawCpuStats {
            cpu_usage: Some(RawCpuUsage {
                total_usage: Some(500_000_000_000),
                usage_in_kernelmode: Some(100_000_000_000),
                usage_in_usermode: Some(400_000_000_000),
                percpu_usage: None,
            }),
            online_cpus: Some(2),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn raw_detail(resource: &Resource) -> RawDetail {
    RawDetail {
        id: Some(resource.id.clone()),
        name: Some(format!("/{}", resource.name)),
        restart_count: Some(resource.restart_count as i64),
        state: Some(RawState {
            status: Some(resource.status.clone()),
            exit_code: Some(resource.exit_code),
            started_at: resource.started_at.map(|t| t.to_rfc3339()),
            health: None,
        }),
        config: Some(RawConfig {
            image: Some(resource.image.clone()),
            labels: Some(resource.labels.clone()),
        }),
    }
}
