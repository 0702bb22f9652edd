// Container filter - decides which containers are scraped
//
// Compiled once from configuration. Pattern errors surface at construction,
// never while matching. Exclude rules always win over include rules.

use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{FilterSet, FiltersConfig};
use crate::labels::Identity;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid {rule} pattern {pattern:?}: {source}")]
    InvalidPattern {
        rule: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiled include/exclude rules over container name, image and labels.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include_labels: HashMap<String, String>,
    exclude_labels: HashMap<String, String>,
    include_names: Vec<Regex>,
    exclude_names: Vec<Regex>,
    include_images: Vec<Regex>,
    exclude_images: Vec<Regex>,
    has_includes: bool,
}

impl Filter {
    /// Compiles the configured rules.
    ///
    /// Label rules are `key=value` (exact value) or `key` (any value).
    /// Name and image rules are regular expressions searched anywhere in the
    /// string; anchor them explicitly for a full match.
    ///
    /// # Errors
    /// `FilterError::InvalidPattern` if any name or image pattern fails to compile.
    pub fn compile(config: &FiltersConfig) -> Result<Self, FilterError> {
        let FilterSet {
            labels: include_labels,
            names: include_names,
            images: include_images,
        } = &config.include;
        let FilterSet {
            labels: exclude_labels,
            names: exclude_names,
            images: exclude_images,
        } = &config.exclude;

        let filter = Filter {
            include_labels: parse_label_rules(include_labels),
            exclude_labels: parse_label_rules(exclude_labels),
            include_names: compile_patterns("include name", include_names)?,
            exclude_names: compile_patterns("exclude name", exclude_names)?,
            include_images: compile_patterns("include image", include_images)?,
            exclude_images: compile_patterns("exclude image", exclude_images)?,
            has_includes: false,
        };

        Ok(Filter {
            has_includes: !filter.include_labels.is_empty()
                || !filter.include_names.is_empty()
                || !filter.include_images.is_empty(),
            ..filter
        })
    }

    /// Returns true if the container should be scraped.
    pub fn matches<I: Identity + ?Sized>(&self, container: &I) -> bool {
        // Excludes first; any single hit rejects
        if matches_labels(container.labels(), &self.exclude_labels)
            || matches_any(container.name(), &self.exclude_names)
            || matches_any(container.image(), &self.exclude_images)
        {
            return false;
        }

        if !self.has_includes {
            return true;
        }

        matches_labels(container.labels(), &self.include_labels)
            || matches_any(container.name(), &self.include_names)
            || matches_any(container.image(), &self.include_images)
    }

    pub fn has_includes(&self) -> bool {
        self.has_includes
    }
}

fn parse_label_rules(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|rule| match rule.split_once('=') {
            Some((key, value)) => Some((key.to_string(), value.to_string())),
            None if !rule.is_empty() => Some((rule.clone(), String::new())),
            None => None,
        })
        .collect()
}

fn compile_patterns(rule: &'static str, patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
                rule,
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

// Empty rule value is a key-only wildcard
fn matches_labels(container: &HashMap<String, String>, rules: &HashMap<String, String>) -> bool {
    rules.iter().any(|(key, want)| match container.get(key) {
        Some(have) => want.is_empty() || have == want,
        None => false,
    })
}

fn matches_any(value: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Health, LifecycleState, Resource};

    fn container(name: &str, image: &str, labels: &[(&str, &str)]) -> Resource {
        Resource {
            id: format!("{name}-id"),
            name: name.to_string(),
            image: image.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            state: LifecycleState::Running,
            status: "running".to_string(),
            health: Health::None,
            restart_count: 0,
            exit_code: 0,
            started_at: None,
        }
    }

    fn rules(labels: &[&str], names: &[&str], images: &[&str]) -> FilterSet {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        FilterSet {
            labels: owned(labels),
            names: owned(names),
            images: owned(images),
        }
    }

    fn filter(include: FilterSet, exclude: FilterSet) -> Filter {
        Filter::compile(&FiltersConfig { include, exclude }).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = Filter::compile(&FiltersConfig::default()).unwrap();

        assert!(!f.has_includes());
        assert!(f.matches(&container("web", "nginx:latest", &[])));
        assert!(f.matches(&container("", "", &[])));
    }

    #[test]
    fn test_exclude_by_name() {
        let f = filter(FilterSet::default(), rules(&[], &["^internal-"], &[]));

        assert!(!f.matches(&container("internal-proxy", "envoy", &[])));
        assert!(f.matches(&container("web", "nginx", &[])));
    }

    #[test]
    fn test_include_by_image() {
        let f = filter(rules(&[], &[], &["^nginx"]), FilterSet::default());

        assert!(f.matches(&container("web", "nginx:latest", &[])));
        assert!(!f.matches(&container("db", "postgres:16", &[])));
    }

    #[test]
    fn test_pattern_is_search_not_full_match() {
        let f = filter(rules(&[], &["api"], &[]), FilterSet::default());

        assert!(f.matches(&container("shop-api-1", "x", &[])));
    }

    #[test]
    fn test_label_rules() {
        let f = filter(
            rules(&["monitor=true", "team"], &[], &[]),
            FilterSet::default(),
        );

        assert!(f.matches(&container("a", "x", &[("monitor", "true")])));
        assert!(!f.matches(&container("b", "x", &[("monitor", "false")])));
        // Key-only rule matches any value
        assert!(f.matches(&container("c", "x", &[("team", "payments")])));
        assert!(!f.matches(&container("d", "x", &[])));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filter(
            rules(&["monitor"], &["web"], &["nginx"]),
            rules(&["skip=yes"], &["web"], &["nginx"]),
        );

        // Every include dimension matches, but so does an exclude
        let c = container("web", "nginx:latest", &[("monitor", "1")]);
        assert!(!f.matches(&c));

        // Exclude on a different dimension still rejects
        let c = container("api", "redis", &[("monitor", "1"), ("skip", "yes")]);
        assert!(!f.matches(&c));
    }

    #[test]
    fn test_include_any_dimension_suffices() {
        let f = filter(rules(&["tier=db"], &["^web$"], &[]), FilterSet::default());

        assert!(f.matches(&container("web", "anything", &[])));
        assert!(f.matches(&container("other", "anything", &[("tier", "db")])));
        assert!(!f.matches(&container("other", "anything", &[("tier", "web")])));
    }

    #[test]
    fn test_invalid_pattern_fails_at_compile() {
        let err = Filter::compile(&FiltersConfig {
            include: FilterSet::default(),
            exclude: rules(&[], &[], &["(unclosed"]),
        })
        .unwrap_err();

        let FilterError::InvalidPattern { rule, pattern, .. } = err;
        assert_eq!(rule, "exclude image");
        assert_eq!(pattern, "(unclosed");
    }

    #[test]
    fn test_empty_label_rule_ignored() {
        let f = filter(rules(&[""], &[], &[]), FilterSet::default());
        assert!(!f.has_includes());
    }
}
