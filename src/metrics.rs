//! Prometheus metrics for the search pipeline.
//!
//! Counters and stage-latency histograms live in one global registry and are
//! exported in text format at `GET /metrics`.

use prometheus::{self, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new())).clone()
}

/// Histogram buckets in seconds, 5ms to 60s. LLM stages run long.
fn default_latency_buckets() -> Vec<f64> {
    vec![
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ]
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("failed to create counter");
    registry
        .register(Box::new(counter.clone()))
        .expect("failed to register metric");
    counter
}

fn histogram(registry: &Registry, name: &str, help: &str) -> Histogram {
    let histogram =
        Histogram::with_opts(HistogramOpts::new(name, help).buckets(default_latency_buckets()))
            .expect("failed to create histogram");
    registry
        .register(Box::new(histogram.clone()))
        .expect("failed to register metric");
    histogram
}

/// All service metrics.
pub struct Metrics {
    pub registry: Registry,

    // Counters
    pub search_queries_total: IntCounter,
    pub search_errors_total: IntCounter,
    /// Candidates removed by the relevance gate.
    pub relevance_rejections_total: IntCounter,
    /// Vector candidates appended to keyword results.
    pub supplemented_results_total: IntCounter,
    pub cache_writes_total: IntCounter,
    pub cache_write_failures_total: IntCounter,
    pub embedding_cache_hits_total: IntCounter,
    pub embedding_cache_misses_total: IntCounter,

    pub uptime_seconds: IntGauge,

    // Histograms
    pub search_duration_seconds: Histogram,
    pub expansion_duration_seconds: Histogram,
    pub embedding_duration_seconds: Histogram,
    pub engine_duration_seconds: Histogram,
    pub rerank_duration_seconds: Histogram,
    pub relevance_duration_seconds: Histogram,

    start_time: RwLock<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with all metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let uptime_seconds = IntGauge::new("litsearch_uptime_seconds", "Server uptime in seconds")
            .expect("failed to create gauge");
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("failed to register metric");

        Self {
            search_queries_total: counter(
                &registry,
                "litsearch_search_queries_total",
                "Total number of search requests",
            ),
            search_errors_total: counter(
                &registry,
                "litsearch_search_errors_total",
                "Search requests answered with the empty response after a failure",
            ),
            relevance_rejections_total: counter(
                &registry,
                "litsearch_relevance_rejections_total",
                "Candidates dropped by the relevance gate",
            ),
            supplemented_results_total: counter(
                &registry,
                "litsearch_supplemented_results_total",
                "Vector candidates appended to keyword results",
            ),
            cache_writes_total: counter(
                &registry,
                "litsearch_cache_writes_total",
                "Search responses persisted to the result cache",
            ),
            cache_write_failures_total: counter(
                &registry,
                "litsearch_cache_write_failures_total",
                "Failed result cache writes",
            ),
            embedding_cache_hits_total: counter(
                &registry,
                "litsearch_embedding_cache_hits_total",
                "Embedding cache hits",
            ),
            embedding_cache_misses_total: counter(
                &registry,
                "litsearch_embedding_cache_misses_total",
                "Embedding cache misses",
            ),
            uptime_seconds,
            search_duration_seconds: histogram(
                &registry,
                "litsearch_search_duration_seconds",
                "End-to-end search duration in seconds",
            ),
            expansion_duration_seconds: histogram(
                &registry,
                "litsearch_expansion_duration_seconds",
                "Query expansion duration in seconds",
            ),
            embedding_duration_seconds: histogram(
                &registry,
                "litsearch_embedding_duration_seconds",
                "Query embedding duration in seconds",
            ),
            engine_duration_seconds: histogram(
                &registry,
                "litsearch_engine_duration_seconds",
                "Search engine round-trip duration in seconds",
            ),
            rerank_duration_seconds: histogram(
                &registry,
                "litsearch_rerank_duration_seconds",
                "Cross-encoder rerank duration in seconds",
            ),
            relevance_duration_seconds: histogram(
                &registry,
                "litsearch_relevance_duration_seconds",
                "Relevance gate duration per candidate batch in seconds",
            ),
            registry,
            start_time: RwLock::new(Instant::now()),
        }
    }

    /// Update the uptime gauge.
    pub fn update_uptime(&self) {
        let uptime = self.start_time.read().elapsed();
        self.uptime_seconds.set(uptime.as_secs() as i64);
    }

    /// Seconds since the metrics were created.
    pub fn uptime(&self) -> Duration {
        self.start_time.read().elapsed()
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;
        self.update_uptime();

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Export the counters as JSON.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.update_uptime();
        MetricsSnapshot {
            search_queries_total: self.search_queries_total.get(),
            search_errors_total: self.search_errors_total.get(),
            relevance_rejections_total: self.relevance_rejections_total.get(),
            supplemented_results_total: self.supplemented_results_total.get(),
            cache_writes_total: self.cache_writes_total.get(),
            cache_write_failures_total: self.cache_write_failures_total.get(),
            uptime_seconds: self.uptime_seconds.get(),
        }
    }

    /// Start a timer that records duration to a histogram when dropped.
    pub fn start_timer(histogram: &Histogram) -> HistogramTimer {
        HistogramTimer {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

/// Timer that records duration to a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Counter snapshot for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub search_queries_total: u64,
    pub search_errors_total: u64,
    pub relevance_rejections_total: u64,
    pub supplemented_results_total: u64,
    pub cache_writes_total: u64,
    pub cache_write_failures_total: u64,
    pub uptime_seconds: i64,
}

/// Health state enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual collaborator check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl HealthCheck {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthState::Healthy,
            message: None,
            duration_ms: None,
        }
    }

    pub fn healthy_with_duration(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..Self::healthy(name)
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthState::Degraded,
            message: Some(message.into()),
            duration_ms: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthState::Unhealthy,
            message: Some(message.into()),
            duration_ms: None,
        }
    }
}

/// Overall state: unhealthy if any check is, degraded if any check is, else healthy.
pub fn overall_state(checks: &[HealthCheck]) -> HealthState {
    if checks.iter().any(|c| c.status == HealthState::Unhealthy) {
        HealthState::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthState::Degraded) {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}
