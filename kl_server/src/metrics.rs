//! Prometheus metrics for monitoring the league server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener
//! (`METRICS_BIND`). Recording is a no-op until the exporter is installed,
//! so handlers call these helpers unconditionally.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route
//! - **League Metrics**: Score reports, bracket advancements, TA rounds
//! - **Cache Metrics**: Standings cache hits and misses
//! - **Auth Metrics**: Login attempts and rate limit hits
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use kl_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/auth/login", 200);
//! metrics::score_reports_total("confirmed");
//! ```

use kart_league::cache::CacheStats;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// `path` is the matched route template so ids do not explode cardinality.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// League Metrics
// ============================================================================

/// Count a participant score report by outcome (`pending`, `confirmed`, `disputed`).
pub fn score_reports_total(outcome: &str) {
    metrics::counter!("score_reports_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count players moved into later bracket slots.
pub fn bracket_advancements_total(mode: &str, slots: usize) {
    metrics::counter!("bracket_advancements_total",
        "mode" => mode.to_string()
    )
    .increment(slots as u64);
}

/// Count played Time Attack elimination rounds.
pub fn ta_rounds_total() {
    metrics::counter!("ta_rounds_total").increment(1);
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Publish standings cache counters.
pub fn cache_stats(stats: CacheStats) {
    metrics::gauge!("standings_cache_hits").set(stats.hits as f64);
    metrics::gauge!("standings_cache_misses").set(stats.misses as f64);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}
