//! Prometheus metrics registry
//!
//! Author: hephaex@gmail.com

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metrics exposed on `/metrics`
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    auth_rejections: IntCounterVec,
    revoked_tokens: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("taskdesk_http_requests_total", "Total number of HTTP requests"),
            &["endpoint", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "taskdesk_http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["endpoint"],
        )?;
        let auth_rejections = IntCounterVec::new(
            Opts::new(
                "taskdesk_auth_rejections_total",
                "Rejected authentication attempts by reason",
            ),
            &["reason"],
        )?;
        let revoked_tokens = IntGauge::new(
            "taskdesk_revoked_tokens",
            "Revoked tokens still held by the revocation store",
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(auth_rejections.clone()))?;
        registry.register(Box::new(revoked_tokens.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            auth_rejections,
            revoked_tokens,
        })
    }

    pub fn record_request(&self, endpoint: &str, status: u16, elapsed: Duration) {
        self.http_requests
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_auth_rejection(&self, reason: &str) {
        self.auth_rejections.with_label_values(&[reason]).inc();
    }

    pub fn set_revoked_tokens(&self, count: usize) {
        self.revoked_tokens
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Content type of [`ApiMetrics::render`] output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
