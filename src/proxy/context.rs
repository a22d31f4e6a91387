use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use std::net::IpAddr;
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context that flows through dispatch, forwarding and
/// sanitization. Tracks how many upstreams have already been tried so the
/// forwarder never attempts the same one twice for one inbound request.
pub struct RequestContext {
    pub method: String,
    pub uri: String,
    pub client_ip: IpAddr,
    pub start: Instant,
    pub attempts: u32,
    pub last_upstream: Option<String>,
}

impl RequestContext {
    pub fn new(method: String, uri: String, client_ip: IpAddr) -> Self {
        Self {
            method,
            uri,
            client_ip,
            start: Instant::now(),
            attempts: 0,
            last_upstream: None,
        }
    }

    pub fn record_attempt(&mut self, upstream: &str) {
        self.attempts += 1;
        self.last_upstream = Some(upstream.to_string());
    }

    pub fn error_response(&self, status: StatusCode, msg: &str) -> hyper::Response<BoxBody> {
        metrics::counter!(
            "rotoproxy_requests_total",
            "method" => self.method.clone(),
            "status_code" => status.as_u16().to_string(),
        )
        .increment(1);

        metrics::histogram!("rotoproxy_request_duration_seconds")
            .record(self.start.elapsed().as_secs_f64());

        hyper::Response::builder()
            .status(status)
            .header("content-type", "text/plain")
            .body(full_body(msg.to_string()))
            .unwrap()
    }

    pub fn finalize_metrics(&self, resp_status: u16) {
        metrics::counter!(
            "rotoproxy_requests_total",
            "method" => self.method.clone(),
            "status_code" => resp_status.to_string(),
        )
        .increment(1);

        metrics::histogram!("rotoproxy_request_duration_seconds")
            .record(self.start.elapsed().as_secs_f64());
    }
}
