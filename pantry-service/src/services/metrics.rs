use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use service_core::error::AppError;
use std::sync::OnceLock;

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    recipe_requests_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build_metrics() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let recipe_requests_total = IntCounterVec::new(
        Opts::new(
            "recipe_requests_total",
            "Recipe requests by outcome (suggested, empty, failed)",
        ),
        &["outcome"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(recipe_requests_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        recipe_requests_total,
    })
}

/// Create the process-wide registry. Safe to call more than once.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let metrics = build_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        AppError::Internal(anyhow::anyhow!("Failed to initialize metrics: {}", e))
    })?;
    let _ = METRICS.set(metrics);
    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(metrics) = METRICS.get() {
        let labels = [method, path, status];
        metrics
            .http_requests_total
            .with_label_values(&labels)
            .inc();
        metrics
            .http_request_duration_seconds
            .with_label_values(&labels)
            .observe(seconds);
    }
}

pub fn record_recipe_outcome(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .recipe_requests_total
            .with_label_values(&[outcome])
            .inc();
    }
}

pub fn get_metrics() -> String {
    let metrics = match METRICS.get() {
        Some(m) => m,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics output is not UTF-8: {}", e);
        "# Metrics output is not UTF-8\n".to_string()
    })
}
