//! Prometheus metrics for chat-service.
//!
//! Recording helpers are no-ops until [`init_metrics`] has run, so handlers
//! can be exercised in tests without a registry.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

/// Registry together with the collectors registered in it.
pub struct ChatMetrics {
    pub registry: Registry,
    // HTTP metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    // Chat metrics
    pub chat_prompts_total: IntCounterVec,
    pub generation_latency_seconds: HistogramVec,
    pub generation_fallbacks_total: IntCounterVec,
    // Store metrics
    pub store_errors_total: IntCounterVec,
}

pub static METRICS: OnceLock<ChatMetrics> = OnceLock::new();

/// Register all metrics. Safe to call more than once, and from several
/// threads: the registry and its collectors are published as one value.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let metrics = build_metrics()?;
    // A concurrent caller may have won; its bundle is equally complete.
    let _ = METRICS.set(metrics);
    Ok(())
}

fn build_metrics() -> Result<ChatMetrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "path"],
    )?;

    // outcome: answered, fallback
    let prompts_total = IntCounterVec::new(
        Opts::new("chat_prompts_total", "Prompts answered, by outcome"),
        &["outcome"],
    )?;

    let generation_latency = HistogramVec::new(
        HistogramOpts::new(
            "chat_generation_latency_seconds",
            "Retrieve-and-generate latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["generator"],
    )?;

    let fallbacks_total = IntCounterVec::new(
        Opts::new(
            "chat_generation_fallbacks_total",
            "Generation failures replaced by the fallback answer",
        ),
        &["generator", "error_type"],
    )?;

    let store_errors = IntCounterVec::new(
        Opts::new("chat_store_errors_total", "Total session store errors"),
        &["operation"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration.clone()))?;
    registry.register(Box::new(prompts_total.clone()))?;
    registry.register(Box::new(generation_latency.clone()))?;
    registry.register(Box::new(fallbacks_total.clone()))?;
    registry.register(Box::new(store_errors.clone()))?;

    Ok(ChatMetrics {
        registry,
        http_requests_total,
        http_request_duration_seconds: http_request_duration,
        chat_prompts_total: prompts_total,
        generation_latency_seconds: generation_latency,
        generation_fallbacks_total: fallbacks_total,
        store_errors_total: store_errors,
    })
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .http_requests_total
            .with_label_values(&[method, path, status.to_string().as_str()])
            .inc();
        metrics
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }
}

pub fn record_prompt(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.chat_prompts_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_generation_latency(generator: &str, duration: Duration) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .generation_latency_seconds
            .with_label_values(&[generator])
            .observe(duration.as_secs_f64());
    }
}

pub fn record_generation_fallback(generator: &str, error_type: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .generation_fallbacks_total
            .with_label_values(&[generator, error_type])
            .inc();
    }
}

pub fn record_store_error(operation: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.store_errors_total.with_label_values(&[operation]).inc();
    }
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather() -> String {
    let Some(metrics) = METRICS.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
