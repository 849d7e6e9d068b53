//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch, cache and reload metrics
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `stencil_requests_total` (counter): dispatched requests by status
//! - `stencil_request_duration_seconds` (histogram): dispatch latency
//! - `stencil_cache_hits_total` / `stencil_cache_misses_total` (counter): by cache
//! - `stencil_route_reloads_total` (counter): route reloads by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality: status code, cache name, reload result

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "stencil_requests_total";
pub const REQUEST_DURATION: &str = "stencil_request_duration_seconds";
pub const CACHE_HITS: &str = "stencil_cache_hits_total";
pub const CACHE_MISSES: &str = "stencil_cache_misses_total";
pub const ROUTE_RELOADS: &str = "stencil_route_reloads_total";

static DESCRIPTIONS: Once = Once::new();

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    describe_metrics();
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Register metric descriptions once per process.
pub fn describe_metrics() {
    DESCRIPTIONS.call_once(|| {
        describe_counter!(REQUESTS_TOTAL, Unit::Count, "Dispatched requests by status.");
        describe_histogram!(
            REQUEST_DURATION,
            Unit::Seconds,
            "Time spent dispatching a request."
        );
        describe_counter!(CACHE_HITS, Unit::Count, "Named cache hits.");
        describe_counter!(CACHE_MISSES, Unit::Count, "Named cache misses.");
        describe_counter!(ROUTE_RELOADS, Unit::Count, "Route table reloads by result.");
    });
}

/// Record a finished dispatch.
pub fn record_request(status: u16, start: Instant) {
    counter!(REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION).record(start.elapsed().as_secs_f64());
}

/// Record a named cache lookup.
pub fn record_cache_lookup(cache: &str, hit: bool) {
    let name = if hit { CACHE_HITS } else { CACHE_MISSES };
    counter!(name, "cache" => cache.to_string()).increment(1);
}

/// Record a route reload attempt.
pub fn record_route_reload(result: &'static str) {
    counter!(ROUTE_RELOADS, "result" => result).increment(1);
}
