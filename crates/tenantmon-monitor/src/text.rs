//! Text exposition through `prometheus::TextEncoder`.
//!
//! Aggregated families are converted to `prometheus::proto` families and
//! encoded as `# HELP`, `# TYPE` and value lines. Histograms get one
//! `_bucket` line per boundary, the encoder's `le="+Inf"` bucket, then
//! `_sum` and `_count`.

use prometheus::proto;
use prometheus::{Encoder, TextEncoder};

use crate::family::{MetricFamily, MetricKind, MetricValue, Sample};

/// Encode `families` in order. Families without samples are skipped.
pub fn encode(families: &[MetricFamily]) -> prometheus::Result<String> {
    let protos: Vec<proto::MetricFamily> = families
        .iter()
        .filter(|f| !f.samples.is_empty())
        .map(to_proto)
        .collect();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&protos, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub fn to_proto(family: &MetricFamily) -> proto::MetricFamily {
    let mut mf = proto::MetricFamily::default();
    mf.set_name(family.name.clone());
    mf.set_help(family.help.clone());
    mf.set_field_type(match family.kind {
        MetricKind::Counter => proto::MetricType::COUNTER,
        MetricKind::Gauge => proto::MetricType::GAUGE,
        MetricKind::Histogram => proto::MetricType::HISTOGRAM,
    });
    let metrics: Vec<proto::Metric> = family.samples.iter().map(sample_to_proto).collect();
    mf.set_metric(metrics.into());
    mf
}

fn sample_to_proto(sample: &Sample) -> proto::Metric {
    let mut m = proto::Metric::default();
    let labels: Vec<proto::LabelPair> = sample
        .labels
        .iter()
        .map(|(name, value)| {
            let mut pair = proto::LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            pair
        })
        .collect();
    m.set_label(labels.into());

    match &sample.value {
        MetricValue::Counter(v) => {
            let mut c = proto::Counter::default();
            c.set_value(*v);
            m.set_counter(c);
        }
        MetricValue::Gauge(v) => {
            let mut g = proto::Gauge::default();
            g.set_value(*v);
            m.set_gauge(g);
        }
        MetricValue::Histogram(h) => {
            let buckets: Vec<proto::Bucket> = h
                .bounds
                .iter()
                .zip(&h.cumulative)
                .map(|(bound, count)| {
                    let mut b = proto::Bucket::default();
                    b.set_upper_bound(*bound);
                    b.set_cumulative_count(*count);
                    b
                })
                .collect();
            let mut ph = proto::Histogram::default();
            ph.set_sample_count(h.count);
            ph.set_sample_sum(h.sum);
            ph.set_bucket(buckets.into());
            m.set_histogram(ph);
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::HistogramSnapshot;

    #[test]
    fn test_encode_counter() {
        let family = MetricFamily::new("syncs_total", "Total syncs", MetricKind::Counter)
            .with_sample(Sample::new(MetricValue::Counter(15.0)));
        assert_eq!(
            encode(&[family]).unwrap(),
            "# HELP syncs_total Total syncs\n# TYPE syncs_total counter\nsyncs_total 15\n"
        );
    }

    #[test]
    fn test_encode_histogram() {
        let h = HistogramSnapshot {
            bounds: vec![0.01, 1.0],
            cumulative: vec![0, 2],
            sum: 1.5,
            count: 3,
        };
        let family = MetricFamily::new("d_seconds", "Duration", MetricKind::Histogram)
            .with_sample(Sample::new(MetricValue::Histogram(h)));
        let expected = "\
# HELP d_seconds Duration
# TYPE d_seconds histogram
d_seconds_bucket{le=\"0.01\"} 0
d_seconds_bucket{le=\"1\"} 2
d_seconds_bucket{le=\"+Inf\"} 3
d_seconds_sum 1.5
d_seconds_count 3
";
        assert_eq!(encode(&[family]).unwrap(), expected);
    }

    #[test]
    fn test_labels_in_order() {
        let family = MetricFamily::new("g", "gauge", MetricKind::Gauge).with_sample(
            Sample::new(MetricValue::Gauge(1.0))
                .with_label("user", "u1")
                .with_label("dc", "x"),
        );
        let text = encode(&[family]).unwrap();
        assert!(text.contains("g{dc=\"x\",user=\"u1\"} 1\n"));
    }

    #[test]
    fn test_labelled_histogram_puts_le_last() {
        let h = HistogramSnapshot::empty(&[1.0]);
        let family = MetricFamily::new("h", "h", MetricKind::Histogram)
            .with_sample(Sample::new(MetricValue::Histogram(h)).with_label("user", "u1"));
        let text = encode(&[family]).unwrap();
        assert!(text.contains("h_bucket{user=\"u1\",le=\"1\"} 0\n"));
        assert!(text.contains("h_bucket{user=\"u1\",le=\"+Inf\"} 0\n"));
        assert!(text.contains("h_count{user=\"u1\"} 0\n"));
    }

    #[test]
    fn test_empty_family_is_skipped() {
        let empty = MetricFamily::new("none", "nothing", MetricKind::Counter);
        assert_eq!(encode(&[empty]).unwrap(), "");
    }

    #[test]
    fn test_to_proto_histogram_fields() {
        let h = HistogramSnapshot {
            bounds: vec![1.0, 10.0],
            cumulative: vec![1, 3],
            sum: 12.0,
            count: 4,
        };
        let family = MetricFamily::new("h", "h", MetricKind::Histogram)
            .with_sample(Sample::new(MetricValue::Histogram(h)));
        let mf = to_proto(&family);
        assert_eq!(mf.get_field_type(), proto::MetricType::HISTOGRAM);
        let ph = mf.get_metric()[0].get_histogram();
        assert_eq!(ph.get_sample_count(), 4);
        assert_eq!(ph.get_sample_sum(), 12.0);
        assert_eq!(ph.get_bucket()[1].get_cumulative_count(), 3);
    }
}
