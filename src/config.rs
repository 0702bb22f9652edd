// Configuration module - layered exporter settings
//
// Settings are resolved in four layers, later ones winning:
// 1. Built-in defaults
// 2. An optional config file (YAML, TOML or JSON, picked by extension)
// 3. Well-known environment variables (EXPORTER_PORT, DOCKER_HOST, ...)
// 4. Command-line flags
//
// The merged tree is deserialized into `ExporterConfig` and validated once
// at startup. Nothing here is reloaded while the process runs.

use ::config::{Config, File};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Route the server always mounts for build information.
pub const VERSION_PATH: &str = "/version";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Built-in defaults, keyed by dotted config path.
const DEFAULTS: &[(&str, DefaultValue)] = &[
    ("server.port", DefaultValue::Str("9200")),
    ("server.address", DefaultValue::Str("0.0.0.0")),
    ("server.metrics_path", DefaultValue::Str("/metrics")),
    ("server.health_path", DefaultValue::Str("/health")),
    ("server.ready_path", DefaultValue::Str("/ready")),
    ("docker.host", DefaultValue::Str("unix:///var/run/docker.sock")),
    ("docker.api_version", DefaultValue::Str("")),
    ("docker.timeout", DefaultValue::Str("30s")),
    ("collection.timeout", DefaultValue::Str("30s")),
    ("collection.collectors.container", DefaultValue::Bool(true)),
    ("collection.collectors.system", DefaultValue::Bool(true)),
    ("metrics.cache.enabled", DefaultValue::Bool(true)),
    ("metrics.cache.ttl", DefaultValue::Str("30s")),
    ("logging.level", DefaultValue::Str("info")),
    ("logging.format", DefaultValue::Str("json")),
    ("logging.output", DefaultValue::Str("stdout")),
    ("performance.max_concurrent", DefaultValue::Int(10)),
];

enum DefaultValue {
    Str(&'static str),
    Bool(bool),
    Int(i64),
}

/// Environment variables bound to config keys.
pub const ENV_BINDINGS: &[(&str, &str)] = &[
    ("EXPORTER_PORT", "server.port"),
    ("EXPORTER_ADDRESS", "server.address"),
    ("EXPORTER_METRICS_PATH", "server.metrics_path"),
    ("DOCKER_HOST", "docker.host"),
    ("DOCKER_API_VERSION", "docker.api_version"),
    ("COLLECTION_TIMEOUT", "collection.timeout"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
    ("MAX_CONCURRENT", "performance.max_concurrent"),
    ("CACHE_TTL", "metrics.cache.ttl"),
    ("CACHE_ENABLED", "metrics.cache.enabled"),
];

/// Complete exporter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    pub server: ServerConfig,
    pub docker: DockerConfig,
    pub collection: CollectionConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: String,
    pub address: String,
    pub metrics_path: String,
    pub health_path: String,
    pub ready_path: String,
}

impl ServerConfig {
    /// Socket address string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Daemon endpoint: unix://, tcp:// or http://
    pub host: String,

    /// "major.minor", or empty for the client default
    pub api_version: String,

    /// Per-request transport timeout
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Deadline for one collection cycle
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,

    pub collectors: CollectorsConfig,

    #[serde(default)]
    pub filters: FiltersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorsConfig {
    pub container: bool,
    pub system: bool,
}

/// Include and exclude rule sets for container selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub include: FilterSet,
    pub exclude: FilterSet,
}

/// One rule set. Labels are `key` or `key=value`; names and images are regexes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub labels: Vec<String>,
    pub names: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,

    #[serde(deserialize_with = "duration")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum concurrent stats fetches
    pub max_concurrent: usize,
}

impl ExporterConfig {
    /// Loads configuration from defaults, an optional file, the process
    /// environment and command-line overrides.
    ///
    /// # Arguments
    /// * `path` - Config file to read; must exist when given
    /// * `overrides` - `(dotted key, value)` pairs taken from CLI flags
    ///
    /// # Returns
    /// * `Ok(ExporterConfig)` - Merged and validated settings
    /// * `Err(ConfigError)` - Unreadable file, bad value or failed validation
    pub fn load(path: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self, ConfigError> {
        Self::load_with_env(path, overrides, |name| std::env::var(name).ok())
    }

    /// Same as `load`, with environment lookups going through `env`.
    pub fn load_with_env<F>(
        path: Option<&Path>,
        overrides: &[(&str, String)],
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();

        for (key, value) in DEFAULTS {
            builder = match value {
                DefaultValue::Str(s) => builder.set_default(*key, *s)?,
                DefaultValue::Bool(b) => builder.set_default(*key, *b)?,
                DefaultValue::Int(i) => builder.set_default(*key, *i)?,
            };
        }

        if let Some(path) = path {
            debug!(path = %path.display(), "Reading config file");
            builder = builder.add_source(File::from(path).required(true));
        }

        for (var, key) in ENV_BINDINGS {
            if let Some(value) = env(*var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        for (key, value) in overrides {
            builder = builder.set_override(*key, value.clone())?;
        }

        let config: ExporterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects settings the exporter cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.server.port.trim().is_empty() {
            return invalid("server.port is required".into());
        }
        if self.server.port.parse::<u16>().is_err() {
            return invalid(format!("server.port {:?} is not a valid port", self.server.port));
        }
        if self.docker.host.trim().is_empty() {
            return invalid("docker.host is required".into());
        }
        if self.performance.max_concurrent < 1 {
            return invalid("performance.max_concurrent must be >= 1".into());
        }
        if self.collection.timeout.is_zero() {
            return invalid("collection.timeout must be greater than zero".into());
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            return invalid(format!(
                "logging.format must be json or text, got {:?}",
                self.logging.format
            ));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr") {
            return invalid(format!(
                "logging.output must be stdout or stderr, got {:?}",
                self.logging.output
            ));
        }

        let routes = [
            ("server.metrics_path", &self.server.metrics_path),
            ("server.health_path", &self.server.health_path),
            ("server.ready_path", &self.server.ready_path),
        ];
        for (i, (key, path)) in routes.iter().enumerate() {
            if !path.starts_with('/') {
                return invalid(format!("{key} must start with '/', got {path:?}"));
            }
            if path.as_str() == VERSION_PATH {
                return invalid(format!("{key} cannot be {VERSION_PATH}, it is reserved"));
            }
            if let Some((other, _)) = routes[..i].iter().find(|(_, p)| p == path) {
                return invalid(format!("{key} and {other} are both {path:?}"));
            }
        }

        Ok(())
    }
}

/// Parses a duration such as "500ms", "30s", "5m", "1h 30m", or bare seconds ("30").
///
/// Everything except the bare-seconds form goes through `humantime`, which
/// rejects values that overflow instead of wrapping.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(raw).map_err(|e| format!("invalid duration {raw:?}: {e}"))
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration like \"30s\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("negative duration {v}")))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
