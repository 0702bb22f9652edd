// Container Stats Exporter
//
// Scrape-driven Prometheus exporter for Docker container statistics.
// Each scrape lists containers, applies the configured filters, fetches
// stats for running containers under bounded concurrency (with an optional
// TTL cache in front), normalizes cgroup v1/v2 counters and emits a labeled
// snapshot.
//
// # Layout
// - `runtime` - runtime capability trait and the Docker adapter
// - `stats` - normalized stats model and the normalizer
// - `labels` / `filter` - container label tuple and selection policy
// - `cache` - TTL stats cache shared across scrapes
// - `metrics` - descriptors, measurements and text exposition
// - `collector` - the collection cycle and daemon-level collector
// - `config` / `server` - layered settings and the HTTP surface

pub mod cache;
pub mod collector;
pub mod config;
pub mod filter;
pub mod labels;
pub mod metrics;
pub mod runtime;
pub mod server;
pub mod stats;

#[cfg(test)]
mod testing;
