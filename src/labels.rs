// Label extraction - the fixed label tuple attached to every container measurement
//
// Label order is global: [container_name, compose_service, compose_project, image].
// Network and block I/O families append one trailing dimension each.

use std::collections::HashMap;

use crate::runtime::Resource;
use crate::stats::Stats;

/// Standard Docker Compose label keys.
pub const LABEL_COMPOSE_SERVICE: &str = "com.docker.compose.service";
pub const LABEL_COMPOSE_PROJECT: &str = "com.docker.compose.project";

/// Label names in emission order.
pub const CONTAINER_LABEL_NAMES: [&str; 4] =
    ["container_name", "compose_service", "compose_project", "image"];

/// Anything carrying container identity: a list record or a stats record.
pub trait Identity {
    fn name(&self) -> &str;
    fn image(&self) -> &str;
    fn labels(&self) -> &HashMap<String, String>;
}

impl Identity for Resource {
    fn name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}

impl Identity for Stats {
    fn name(&self) -> &str {
        &self.name
    }

    fn image(&self) -> &str {
        &self.image
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}

/// Sanitized label tuple for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLabels {
    pub container_name: String,
    pub compose_service: String,
    pub compose_project: String,
    pub image: String,
}

impl ContainerLabels {
    /// Builds the label tuple from any identity source.
    ///
    /// A list record and a stats record describing the same container yield
    /// identical tuples.
    pub fn extract<I: Identity + ?Sized>(identity: &I) -> Self {
        let label = |key: &str| {
            identity
                .labels()
                .get(key)
                .map(|v| sanitize(v))
                .unwrap_or_default()
        };

        ContainerLabels {
            container_name: sanitize(identity.name()),
            compose_service: label(LABEL_COMPOSE_SERVICE),
            compose_project: label(LABEL_COMPOSE_PROJECT),
            image: sanitize(identity.image()),
        }
    }

    /// Label values in the same order as `CONTAINER_LABEL_NAMES`.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.container_name.clone(),
            self.compose_service.clone(),
            self.compose_project.clone(),
            self.image.clone(),
        ]
    }

    /// Label values with extra trailing dimensions appended.
    pub fn values_with(&self, extra: &[&str]) -> Vec<String> {
        let mut values = self.values();
        values.extend(extra.iter().map(|v| v.to_string()));
        values
    }
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '/' | '.' | '@' | '-' | '=')
}

/// Trims surrounding whitespace and replaces every character outside
/// `[A-Za-z0-9_:/.@=-]` with `_`. Idempotent.
pub fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if is_safe(c) { c } else { '_' })
        .collect()
}
