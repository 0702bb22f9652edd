// Exposition encoding: measurements -> Prometheus metric families -> text

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::HashMap;

use super::{Measurement, MetricKind};

/// Groups measurements into one family per metric name, in first-seen order.
pub fn to_metric_families(measurements: &[Measurement]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for m in measurements {
        let desc = m.desc();
        let slot = *index.entry(desc.name()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(desc.name().to_string());
            family.set_help(desc.help().to_string());
            family.set_field_type(match desc.kind() {
                MetricKind::Gauge => MetricType::GAUGE,
                MetricKind::Counter => MetricType::COUNTER,
            });
            families.push(family);
            families.len() - 1
        });

        families[slot].mut_metric().push(to_proto(m));
    }

    families
}

fn to_proto(m: &Measurement) -> Metric {
    let mut metric = Metric::default();

    for (name, value) in m.desc().label_names().iter().zip(m.label_values()) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }

    match m.desc().kind() {
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(m.value());
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(m.value());
            metric.set_counter(counter);
        }
    }

    metric
}

/// Renders measurements in the Prometheus text exposition format.
pub fn encode_text(measurements: &[Measurement]) -> prometheus::Result<String> {
    let families = to_metric_families(measurements);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricDesc;

    #[test]
    fn test_groups_by_name() {
        let a = MetricDesc::gauge("a_bytes", "A.", &["x"]);
        let b = MetricDesc::counter("b_total", "B.", &[]);

        let ms = vec![
            Measurement::new(&a, 1.0, vec!["1".into()]).unwrap(),
            Measurement::new(&b, 2.0, vec![]).unwrap(),
            Measurement::new(&a, 3.0, vec!["2".into()]).unwrap(),
        ];
        let families = to_metric_families(&ms);

        assert_eq!(families.len(), 2);
        assert_eq!(families[0].get_name(), "a_bytes");
        assert_eq!(families[0].get_metric().len(), 2);
        assert_eq!(families[1].get_field_type(), MetricType::COUNTER);
    }

    #[test]
    fn test_encode_text() {
        let desc = MetricDesc::gauge(
            "container_memory_usage_bytes",
            "Current memory usage in bytes.",
            &["container_name", "image"],
        );
        let ms = vec![Measurement::new(&desc, 100.0, vec!["web".into(), "nginx:latest".into()]).unwrap()];

        let text = encode_text(&ms).unwrap();

        assert!(text.contains("# HELP container_memory_usage_bytes Current memory usage in bytes."));
        assert!(text.contains("# TYPE container_memory_usage_bytes gauge"));
        assert!(text.contains(r#"container_memory_usage_bytes{container_name="web",image="nginx:latest"} 100"#));
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_text(&[]).unwrap(), "");
    }
}
