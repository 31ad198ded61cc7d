use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Name of the published gauge family.
pub const METRIC_NAME: &str = "mysql_query_exporter";
pub const METRIC_HELP: &str = "The number of rows returned by specified MySQL count queries, \
     labeled by query name and SQL statement.";

const LABELS: [&str; 2] = ["name", "query"];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("exposition is not valid utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Labeled gauge holding the latest count per `(name, query)` pair.
///
/// Cheap to clone; clones share the same registry. Safe to write from many
/// loops and scrape concurrently without external locking.
#[derive(Clone)]
pub struct QueryMetrics {
    registry: Registry,
    counts: GaugeVec,
    /// Label pairs that have received at least one value.
    published: Arc<RwLock<HashSet<(String, String)>>>,
}

impl QueryMetrics {
    /// Build a fresh registry with the count gauge registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let counts = GaugeVec::new(Opts::new(METRIC_NAME, METRIC_HELP), &LABELS)?;
        registry.register(Box::new(counts.clone()))?;

        Ok(Self {
            registry,
            counts,
            published: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// Create or overwrite the sample for `(name, query)`.
    pub fn set_count(&self, name: &str, query: &str, value: f64) {
        self.counts.with_label_values(&[name, query]).set(value);

        let key = (name.to_string(), query.to_string());
        let known = self
            .published
            .read()
            .map(|set| set.contains(&key))
            .unwrap_or(false);
        if !known && let Ok(mut set) = self.published.write() {
            set.insert(key);
        }
    }

    /// Current sample, or `None` if nothing was published for the pair yet.
    pub fn sample(&self, name: &str, query: &str) -> Option<f64> {
        let key = (name.to_string(), query.to_string());
        let known = self.published.read().ok()?.contains(&key);
        if !known {
            return None;
        }
        self.counts
            .get_metric_with_label_values(&[name, query])
            .ok()
            .map(|g| g.get())
    }

    /// Number of distinct label pairs published so far.
    pub fn len(&self) -> usize {
        self.published.read().map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Underlying registry, for callers that want to add their own collectors.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every sample in the Prometheus text exposition format.
    pub fn scrape(&self) -> Result<String, MetricsError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        prometheus::Encoder::encode(&TextEncoder::new(), &families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// `Content-Type` of [`QueryMetrics::scrape`] output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_scrapes_without_samples() {
        let metrics = QueryMetrics::new().unwrap();
        assert!(metrics.is_empty());

        let body = metrics.scrape().unwrap();
        assert!(!body.contains("mysql_query_exporter{"));
    }

    #[test]
    fn set_count_creates_then_overwrites() {
        let metrics = QueryMetrics::new().unwrap();
        assert_eq!(metrics.sample("a", "SELECT 1"), None);

        metrics.set_count("a", "SELECT 1", 3.0);
        assert_eq!(metrics.sample("a", "SELECT 1"), Some(3.0));

        metrics.set_count("a", "SELECT 1", 7.0);
        assert_eq!(metrics.sample("a", "SELECT 1"), Some(7.0));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn same_name_different_query_is_a_separate_sample() {
        let metrics = QueryMetrics::new().unwrap();
        metrics.set_count("dup", "SELECT 1", 1.0);
        metrics.set_count("dup", "SELECT 2", 2.0);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.sample("dup", "SELECT 1"), Some(1.0));
        assert_eq!(metrics.sample("dup", "SELECT 2"), Some(2.0));
    }

    #[test]
    fn scrape_renders_help_type_and_labels() {
        let metrics = QueryMetrics::new().unwrap();
        metrics.set_count("orders", "SELECT COUNT(*) FROM orders", 12.0);

        let body = metrics.scrape().unwrap();
        assert!(body.contains(&format!("# HELP {METRIC_NAME} {METRIC_HELP}")));
        assert!(body.contains(&format!("# TYPE {METRIC_NAME} gauge")));
        assert!(body.contains(
            r#"mysql_query_exporter{name="orders",query="SELECT COUNT(*) FROM orders"} 12"#
        ));
    }

    #[test]
    fn quotes_in_query_text_are_escaped() {
        let metrics = QueryMetrics::new().unwrap();
        metrics.set_count("pending", r#"SELECT COUNT(*) FROM t WHERE s = "p""#, 1.0);

        let body = metrics.scrape().unwrap();
        assert!(body.contains(r#"query="SELECT COUNT(*) FROM t WHERE s = \"p\"""#));
    }

    #[test]
    fn registries_are_isolated() {
        let a = QueryMetrics::new().unwrap();
        let b = QueryMetrics::new().unwrap();
        a.set_count("x", "SELECT 1", 1.0);

        assert_eq!(b.sample("x", "SELECT 1"), None);
        assert!(b.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_and_scrapes_never_tear() {
        let metrics = QueryMetrics::new().unwrap();
        // Every writer only ever stores values of the form k * 1000 + k.
        let mut writers = Vec::new();
        for w in 0..4u32 {
            let metrics = metrics.clone();
            writers.push(tokio::spawn(async move {
                for k in 0..500u32 {
                    let v = f64::from(k * 1000 + k);
                    metrics.set_count(&format!("q{w}"), "SELECT COUNT(*) FROM t", v);
                    tokio::task::yield_now().await;
                }
            }));
        }

        let reader = {
            let metrics = metrics.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let body = metrics.scrape().unwrap();
                    for line in body.lines().filter(|l| l.starts_with(METRIC_NAME)) {
                        let value: f64 = line.rsplit(' ').next().unwrap().parse().unwrap();
                        let v = value as u32;
                        assert_eq!(v / 1000, v % 1000, "torn sample: {line}");
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for w in writers {
            w.await.unwrap();
        }
        reader.await.unwrap();
        assert_eq!(metrics.len(), 4);
    }
}
