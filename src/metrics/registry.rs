use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static INSTANCE: OnceLock<Metrics> = OnceLock::new();

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Histogram bucket boundaries for response body size (bytes).
const SIZE_BUCKETS: &[f64] = &[
    100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0, 100000.0, 500000.0, 1000000.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`, `gauge!`,
/// `histogram!`) can be used anywhere in the codebase. The `PrometheusHandle`
/// is retained solely for rendering the `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Idempotent: the first caller wins and installs the global recorder,
    /// every later call (including from test code that builds a fresh
    /// `AppState` per test) just clones the cached handle instead of trying
    /// to install a second global recorder, which the `metrics` crate
    /// forbids.
    pub fn install() -> Self {
        INSTANCE.get_or_init(Self::install_once).clone()
    }

    fn install_once() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full("rotoproxy_response_size_bytes".to_string()),
                SIZE_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        // --- Describe all metrics (adds HELP / TYPE lines) ---

        // request path
        describe_counter!(
            "rotoproxy_requests_total",
            Unit::Count,
            "Total inbound requests handled"
        );
        describe_histogram!(
            "rotoproxy_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective"
        );
        describe_histogram!(
            "rotoproxy_upstream_duration_seconds",
            Unit::Seconds,
            "Time spent waiting on the selected upstream proxy"
        );
        describe_gauge!(
            "rotoproxy_requests_in_flight",
            Unit::Count,
            "Number of requests currently being forwarded"
        );
        describe_histogram!(
            "rotoproxy_response_size_bytes",
            Unit::Bytes,
            "Response body size in bytes"
        );

        // rotation
        describe_counter!(
            "rotoproxy_rotations_total",
            Unit::Count,
            "Total cursor advances across the proxy pool"
        );
        describe_counter!(
            "rotoproxy_upstream_attempts_total",
            Unit::Count,
            "Total upstream attempts, including retries"
        );
        describe_counter!(
            "rotoproxy_upstream_rejected_total",
            Unit::Count,
            "Total attempts where the upstream proxy itself refused the request"
        );

        // liveness checker
        describe_counter!(
            "rotoproxy_checker_live_total",
            Unit::Count,
            "Total proxies confirmed live by the checker"
        );
        describe_counter!(
            "rotoproxy_checker_dead_total",
            Unit::Count,
            "Total proxies confirmed dead by the checker"
        );

        // MITM interception
        describe_counter!(
            "rotoproxy_connect_total",
            Unit::Count,
            "Total CONNECT requests received"
        );
        describe_counter!(
            "rotoproxy_mitm_intercepted_total",
            Unit::Count,
            "Total CONNECT tunnels intercepted and decrypted"
        );
        describe_counter!(
            "rotoproxy_auth_rejected_total",
            Unit::Count,
            "Total requests rejected for failing proxy authentication"
        );

        // connections
        describe_gauge!(
            "rotoproxy_connections_active",
            Unit::Count,
            "Number of active downstream connections"
        );
        describe_counter!(
            "rotoproxy_connections_total",
            Unit::Count,
            "Total connections accepted"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
