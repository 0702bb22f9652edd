// Metrics module - measurement descriptors, samples and emission
//
// A `MetricDesc` is static metadata (name, help, kind, label names). A
// `Measurement` is one labeled sample checked against its descriptor at
// construction. Collectors push samples through an `Emitter`, which drops
// and logs malformed ones instead of failing the scrape.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub mod catalog;
mod encode;

pub use catalog::MetricCatalog;
pub use encode::{encode_text, to_metric_families};

/// Nanosecond counters are exposed in seconds.
pub const NANOSECONDS_TO_SECONDS: f64 = 1e-9;

#[derive(Error, Debug, PartialEq)]
pub enum MetricError {
    #[error("metric {metric}: expected {expected} label values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static metadata for one measurement family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDesc {
    name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(name: &str, help: &str, kind: MetricKind, label_names: &[&str]) -> Arc<Self> {
        Arc::new(MetricDesc {
            name: name.to_string(),
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        })
    }

    pub fn gauge(name: &str, help: &str, label_names: &[&str]) -> Arc<Self> {
        Self::new(name, help, MetricKind::Gauge, label_names)
    }

    pub fn counter(name: &str, help: &str, label_names: &[&str]) -> Arc<Self> {
        Self::new(name, help, MetricKind::Counter, label_names)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// One named, labeled numeric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    desc: Arc<MetricDesc>,
    label_values: Vec<String>,
    value: f64,
}

impl Measurement {
    /// Builds a sample, rejecting a label count that disagrees with the descriptor.
    pub fn new(
        desc: &Arc<MetricDesc>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self, MetricError> {
        if label_values.len() != desc.label_names.len() {
            return Err(MetricError::LabelCardinality {
                metric: desc.name.clone(),
                expected: desc.label_names.len(),
                got: label_values.len(),
            });
        }

        Ok(Measurement {
            desc: Arc::clone(desc),
            label_values,
            value,
        })
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Looks up a label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.label_values[idx].as_str())
    }
}

/// Accumulates measurements for one collector run.
#[derive(Debug, Default)]
pub struct Emitter {
    measurements: Vec<Measurement>,
    dropped: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample; a malformed one is logged and dropped.
    pub fn emit(&mut self, desc: &Arc<MetricDesc>, value: f64, label_values: Vec<String>) {
        match Measurement::new(desc, value, label_values) {
            Ok(m) => self.measurements.push(m),
            Err(e) => {
                warn!(error = %e, "Failed to create metric, dropping it");
                self.dropped += 1;
            }
        }
    }

    /// Number of samples dropped for shape errors.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn finish(self) -> Vec<Measurement> {
        self.measurements
    }
}
