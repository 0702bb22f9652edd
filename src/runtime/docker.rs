// Docker adapter - `RuntimeClient` backed by the Docker Engine API
//
// Talks to the daemon through bollard. Responses are bridged through
// serde_json into the crate's own wire models so the normalizer never
// depends on bollard's types.

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use bollard::errors::Error as BollardError;
use bollard::image::ListImagesOptions;
use bollard::network::ListNetworksOptions;
use bollard::volume::ListVolumesOptions;
use bollard::{ClientVersion, Docker, API_DEFAULT_VERSION};
use futures_util::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::raw::RawSummary;
use super::{
    parse_timestamp, trim_leading_slash, ClientError, Health, LifecycleState, RawDetail, RawStats,
    Resource, RuntimeClient, SystemInfo,
};
use crate::config::DockerConfig;

/// Docker Engine client.
pub struct DockerClient {
    docker: Docker,
    max_concurrent: usize,
}

impl DockerClient {
    /// Connects to the daemon described by `config`.
    ///
    /// Nothing is sent over the wire here; an unreachable daemon surfaces on
    /// the first request. Unsupported host schemes and malformed API
    /// versions fail immediately.
    ///
    /// # Arguments
    /// * `config` - Host, API version and per-request timeout
    /// * `max_concurrent` - Upper bound on parallel inspect calls during `list`
    pub fn connect(config: &DockerConfig, max_concurrent: usize) -> Result<Self, ClientError> {
        let version = parse_api_version(&config.api_version)?;
        let timeout_secs = config.timeout.as_secs().max(1);

        let docker = match host_scheme(&config.host)? {
            HostScheme::Unix => Docker::connect_with_socket(&config.host, timeout_secs, &version)?,
            HostScheme::Http => Docker::connect_with_http(&config.host, timeout_secs, &version)?,
        };

        debug!(host = %config.host, "Docker client configured");

        Ok(DockerClient {
            docker,
            max_concurrent: max_concurrent.max(1),
        })
    }

    async fn inspect(&self, id: &str) -> Result<RawDetail, ClientError> {
        let detail = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found_or(e, id))?;
        bridge(&detail)
    }
}

#[derive(Debug, PartialEq)]
enum HostScheme {
    Unix,
    Http,
}

fn host_scheme(host: &str) -> Result<HostScheme, ClientError> {
    if host.starts_with("unix://") {
        Ok(HostScheme::Unix)
    } else if host.starts_with("tcp://") || host.starts_with("http://") {
        Ok(HostScheme::Http)
    } else {
        Err(ClientError::InvalidConfig(format!(
            "unsupported docker host {host:?}, expected unix://, tcp:// or http://"
        )))
    }
}

/// Parses "major.minor"; an empty string selects the client default.
fn parse_api_version(raw: &str) -> Result<ClientVersion, ClientError> {
    let raw = raw.trim().trim_start_matches('v');
    if raw.is_empty() {
        return Ok(API_DEFAULT_VERSION.clone());
    }

    let invalid = || ClientError::InvalidConfig(format!("invalid docker api version {raw:?}"));
    let (major, minor) = raw.split_once('.').ok_or_else(invalid)?;

    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// Re-decodes a bollard model as one of the crate's wire models.
fn bridge<T: Serialize, U: DeserializeOwned>(value: &T) -> Result<U, ClientError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

fn not_found_or(err: BollardError, id: &str) -> ClientError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => ClientError::NotFound(id.to_string()),
        other => ClientError::Api(other),
    }
}

/// Builds a resource from a list entry, enriched with inspect detail when available.
fn to_resource(summary: RawSummary, detail: Option<RawDetail>) -> Resource {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| trim_leading_slash(n).to_string())
        .unwrap_or_default();
    let status = summary.state.unwrap_or_default();

    let mut resource = Resource {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
        state: LifecycleState::from_docker(&status),
        status,
        health: Health::None,
        restart_count: 0,
        exit_code: 0,
        started_at: None,
    };

    let Some(detail) = detail else {
        return resource;
    };

    resource.restart_count = detail.restart_count.unwrap_or(0).max(0) as u64;
    if let Some(state) = detail.state {
        resource.exit_code = state.exit_code.unwrap_or(0);
        resource.started_at = state.started_at.as_deref().and_then(parse_timestamp);
        resource.health = state
            .health
            .and_then(|h| h.status)
            .and_then(|s| Health::parse(&s))
            .unwrap_or_default();
    }

    resource
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn list(&self) -> Result<Vec<Resource>, ClientError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;

        let summaries: Vec<RawSummary> = summaries
            .iter()
            .map(bridge::<_, RawSummary>)
            .collect::<Result<_, _>>()?;

        debug!(count = summaries.len(), "Listed containers");

        let resources: Vec<Resource> = stream::iter(summaries)
            .map(|summary| async move {
                let id = summary.id.clone().unwrap_or_default();
                let detail = match self.inspect(&id).await {
                    Ok(detail) => Some(detail),
                    Err(e) => {
                        warn!(container = %id, error = %e, "Inspect failed, using list data only");
                        None
                    }
                };
                to_resource(summary, detail)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        Ok(resources)
    }

    async fn fetch_stats(&self, id: &str) -> Result<(RawStats, RawDetail), ClientError> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };

        let mut stream = self.docker.stats(id, Some(options));
        let stats = match stream.next().await {
            Some(result) => result.map_err(|e| not_found_or(e, id))?,
            None => return Err(ClientError::EmptyStats(id.to_string())),
        };
        let raw: RawStats = bridge(&stats)?;

        let detail = self.inspect(id).await?;

        Ok((raw, detail))
    }

    async fn ping(&self) -> Result<(), ClientError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn system_info(&self) -> Result<SystemInfo, ClientError> {
        let info = self.docker.info().await?;
        let images = self
            .docker
            .list_images(None::<ListImagesOptions<String>>)
            .await?;
        let volumes = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await?;
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await?;

        let count = |n: Option<i64>| n.unwrap_or(0).max(0) as u64;

        Ok(SystemInfo {
            containers_running: count(info.containers_running),
            containers_paused: count(info.containers_paused),
            containers_stopped: count(info.containers_stopped),
            images: images.len() as u64,
            volumes: volumes.volumes.map(|v| v.len()).unwrap_or(0) as u64,
            networks: networks.len() as u64,
            server_version: info.server_version.unwrap_or_default(),
        })
    }
}
