//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Collector registration stays private; callers use typed increment helpers.
//! - Label values are passed as borrowed strings to keep hot paths allocation-free.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    fetches_total: IntCounterVec,
    tool_invocations_total: IntCounterVec,
    transcode_fallbacks_total: IntCounter,
    active_streams: IntGauge,
    stream_bytes_total: IntCounter,
    artifacts_removed_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
}

/// Point-in-time view of selected collectors for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Streams currently being served.
    pub active_streams: i64,
    /// Total bytes written to streaming clients.
    pub stream_bytes_total: u64,
    /// Streams served from the original after a failed transcode.
    pub transcode_fallbacks_total: u64,
}

impl Metrics {
    /// Construct a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests served",
            &["route", "code"],
        )?;
        let fetches_total = counter_vec(
            "fetches_total",
            "Media fetches by platform and outcome",
            &["platform", "outcome"],
        )?;
        let tool_invocations_total = counter_vec(
            "tool_invocations_total",
            "External tool invocations by tool and outcome",
            &["tool", "outcome"],
        )?;
        let transcode_fallbacks_total = IntCounter::with_opts(Opts::new(
            "transcode_fallbacks_total",
            "Streams that fell back to the original after a failed transcode",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "transcode_fallbacks_total",
            source,
        })?;
        let active_streams = IntGauge::with_opts(Opts::new(
            "active_streams",
            "Streams currently being served",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "active_streams",
            source,
        })?;
        let stream_bytes_total = IntCounter::with_opts(Opts::new(
            "stream_bytes_total",
            "Bytes written to streaming clients",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "stream_bytes_total",
            source,
        })?;
        let artifacts_removed_total = counter_vec(
            "artifacts_removed_total",
            "Scratch artifacts removed by reason",
            &["reason"],
        )?;
        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Domain events emitted by type",
            &["type"],
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "fetches_total", &fetches_total)?;
        register(&registry, "tool_invocations_total", &tool_invocations_total)?;
        register(
            &registry,
            "transcode_fallbacks_total",
            &transcode_fallbacks_total,
        )?;
        register(&registry, "active_streams", &active_streams)?;
        register(&registry, "stream_bytes_total", &stream_bytes_total)?;
        register(&registry, "artifacts_removed_total", &artifacts_removed_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                fetches_total,
                tool_invocations_total,
                transcode_fallbacks_total,
                active_streams,
                stream_bytes_total,
                artifacts_removed_total,
                events_emitted_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a fetch attempt for `platform` that ended with `outcome`.
    pub fn inc_fetch(&self, platform: &str, outcome: &str) {
        self.inner
            .fetches_total
            .with_label_values(&[platform, outcome])
            .inc();
    }

    /// Count an external tool invocation.
    pub fn inc_tool_invocation(&self, tool: &str, outcome: &str) {
        self.inner
            .tool_invocations_total
            .with_label_values(&[tool, outcome])
            .inc();
    }

    /// Count a stream that fell back to the original artifact.
    pub fn inc_transcode_fallback(&self) {
        self.inner.transcode_fallbacks_total.inc();
    }

    /// Mark a stream as started.
    pub fn stream_started(&self) {
        self.inner.active_streams.inc();
    }

    /// Mark a stream as finished, whether completed or aborted.
    pub fn stream_finished(&self) {
        self.inner.active_streams.dec();
    }

    /// Add bytes written to a streaming client.
    pub fn add_stream_bytes(&self, bytes: u64) {
        self.inner.stream_bytes_total.inc_by(bytes);
    }

    /// Count a removed scratch artifact.
    pub fn inc_artifact_removed(&self, reason: &str) {
        self.inner
            .artifacts_removed_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Count an emitted domain event.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Snapshot of streaming gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_streams: self.inner.active_streams.get(),
            stream_bytes_total: self.inner.stream_bytes_total.get(),
            transcode_fallbacks_total: self.inner.transcode_fallbacks_total.get(),
        }
    }

    /// Current value of a labelled fetch counter.
    #[must_use]
    pub fn fetch_count(&self, platform: &str, outcome: &str) -> u64 {
        self.inner
            .fetches_total
            .with_label_values(&[platform, outcome])
            .get()
    }

    /// Current value of a labelled removal counter.
    #[must_use]
    pub fn artifacts_removed(&self, reason: &str) -> u64 {
        self.inner
            .artifacts_removed_total
            .with_label_values(&[reason])
            .get()
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_collectors() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/stream", 206);
        metrics.inc_fetch("youtube", "success");
        metrics.inc_tool_invocation("yt-dlp", "success");
        metrics.inc_artifact_removed("cleanup");
        metrics.inc_event("fetch_started");

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("fetches_total"));
        assert!(rendered.contains("tool_invocations_total"));
        assert!(rendered.contains("artifacts_removed_total"));
        assert!(rendered.contains("events_emitted_total"));
        Ok(())
    }

    #[test]
    fn snapshot_tracks_streams() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.stream_started();
        metrics.stream_started();
        metrics.stream_finished();
        metrics.add_stream_bytes(1024);
        metrics.inc_transcode_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_streams, 1);
        assert_eq!(snapshot.stream_bytes_total, 1024);
        assert_eq!(snapshot.transcode_fallbacks_total, 1);
        Ok(())
    }

    #[test]
    fn labelled_counters_are_readable() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_fetch("tiktok", "failure");
        metrics.inc_fetch("tiktok", "failure");
        metrics.inc_artifact_removed("sweep");
        assert_eq!(metrics.fetch_count("tiktok", "failure"), 2);
        assert_eq!(metrics.fetch_count("tiktok", "success"), 0);
        assert_eq!(metrics.artifacts_removed("sweep"), 1);
        Ok(())
    }

    #[test]
    fn clones_share_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.stream_started();
        assert_eq!(metrics.snapshot().active_streams, 1);
        Ok(())
    }
}
