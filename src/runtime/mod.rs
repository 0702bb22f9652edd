// Runtime module - the capability seam between the pipeline and the container runtime
//
// The collection pipeline only ever talks to `RuntimeClient`. The Docker
// adapter in `docker.rs` implements it against a real daemon; tests plug in
// an in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub mod docker;
pub mod raw;

pub use raw::{RawDetail, RawStats};

/// Errors returned by a runtime client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("container runtime request failed: {0}")]
    Api(#[from] bollard::errors::Error),

    #[error("decoding runtime response failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("container {0} not found")]
    NotFound(String),

    #[error("runtime returned no stats for container {0}")]
    EmptyStats(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle state of a container as seen at list time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Stopped,
    Other,
}

impl LifecycleState {
    /// Maps a Docker state string ("running", "exited", ...) to a lifecycle state.
    pub fn from_docker(state: &str) -> Self {
        match state {
            "running" => LifecycleState::Running,
            "exited" | "dead" | "created" => LifecycleState::Stopped,
            _ => LifecycleState::Other,
        }
    }
}

/// Container health as reported by the runtime's healthcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    #[default]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

impl Health {
    /// Parses a Docker health status. Unknown or empty strings yield `None`
    /// so callers can omit the field instead of inventing a value.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "none" => Some(Health::None),
            "starting" => Some(Health::Starting),
            "healthy" => Some(Health::Healthy),
            "unhealthy" => Some(Health::Unhealthy),
            _ => None,
        }
    }

    /// Label value used in `container_info`; empty when no healthcheck is configured.
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::None => "",
            Health::Starting => "starting",
            Health::Healthy => "healthy",
            Health::Unhealthy => "unhealthy",
        }
    }

    /// Numeric encoding: 0=none, 1=starting, 2=healthy, 3=unhealthy.
    pub fn as_gauge(&self) -> f64 {
        match self {
            Health::None => 0.0,
            Health::Starting => 1.0,
            Health::Healthy => 2.0,
            Health::Unhealthy => 3.0,
        }
    }
}

/// Identity snapshot of one container, produced by a list call.
///
/// Immutable for the duration of a scrape cycle.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Full container ID
    pub id: String,

    /// Container name without the leading slash
    pub name: String,

    /// Image reference the container was created from
    pub image: String,

    /// Container labels (compose metadata lives here)
    pub labels: HashMap<String, String>,

    /// Lifecycle state used to decide whether stats are fetched
    pub state: LifecycleState,

    /// Raw runtime state string, e.g. "running" or "exited"
    pub status: String,

    pub health: Health,
    pub restart_count: u64,
    pub exit_code: i64,

    /// Absent if the container never started
    pub started_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// First 12 characters of the ID, the form the Docker CLI prints.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Daemon-wide counts used by the system collector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInfo {
    pub containers_running: u64,
    pub containers_paused: u64,
    pub containers_stopped: u64,
    pub images: u64,
    pub volumes: u64,
    pub networks: u64,
    pub server_version: String,
}

/// Capability interface the collection pipeline depends on.
///
/// Implemented by the Docker adapter and by test doubles. Every method is a
/// suspension point; callers apply their own deadline on top.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Returns the full inventory, including non-running containers.
    async fn list(&self) -> Result<Vec<Resource>, ClientError>;

    /// One-shot stats snapshot plus the inspect detail the stats call omits.
    async fn fetch_stats(&self, id: &str) -> Result<(RawStats, RawDetail), ClientError>;

    /// Liveness probe for the runtime, used by the readiness endpoint.
    async fn ping(&self) -> Result<(), ClientError>;

    /// Daemon-level counts for the system collector.
    async fn system_info(&self) -> Result<SystemInfo, ClientError>;
}

/// Parses an RFC 3339 timestamp as reported by Docker.
///
/// Docker reports "0001-01-01T00:00:00Z" for containers that never started;
/// anything at or before the Unix epoch is treated as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.timestamp() > 0)
}

pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

pub(crate) fn trim_leading_slash(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}
