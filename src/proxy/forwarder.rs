use crate::error::ProxyError;
use crate::pool::UpstreamProxy;
use crate::proxy::context::{full_body, BoxBody, RequestContext};
use crate::proxy::sanitize::remove_hop_headers;
use crate::server::state::AppState;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::time::Duration;
use tracing::{debug, warn};

/// Forward one inbound proxy request through the rotating upstream pool,
/// falling back to direct egress if every upstream fails. Mirrors the
/// request/response lifecycle the pool's cursor describes: one cursor
/// advance per inbound request, one attempt per upstream, never repeating
/// an upstream within the same request.
pub async fn forward(
    state: &AppState,
    req: Request<BoxBody>,
    ctx: &mut RequestContext,
) -> Response<BoxBody> {
    let scheme = req.uri().scheme_str().unwrap_or("").to_string();
    if scheme != "http" && scheme != "https" {
        return ctx.error_response(
            StatusCode::BAD_GATEWAY,
            &format!("unsupported protocol scheme \"{}\"", scheme),
        );
    }

    let _sync_guard = if state.options.sync {
        Some(state.sync_lock.lock().await)
    } else {
        None
    };

    let (mut parts, body) = req.into_parts();
    remove_hop_headers(&mut parts.headers);

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return ctx.error_response(
                StatusCode::BAD_GATEWAY,
                &format!("failed reading request body: {}", e),
            )
        }
    };

    let order = state.rotator.advance_and_order(&state.pool);
    metrics::counter!("rotoproxy_rotations_total").increment(1);

    for upstream in &order {
        ctx.record_attempt(upstream.as_str());
        metrics::counter!("rotoproxy_upstream_attempts_total").increment(1);

        match send_via(Some(upstream), &parts, &body_bytes, state.options.timeout).await {
            Ok(resp) if resp.status().as_u16() == state.options.upstream_reject_status => {
                metrics::counter!("rotoproxy_upstream_rejected_total").increment(1);
                let err = ProxyError::UpstreamRejected(resp.status().as_u16());
                debug!("forwarder: upstream={}, {}", upstream, err);
                continue;
            }
            Ok(resp) => {
                return match into_hyper_response(resp).await {
                    Ok(r) => {
                        ctx.finalize_metrics(r.status().as_u16());
                        r
                    }
                    Err(e) => ctx.error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
                };
            }
            Err(e) => {
                warn!("forwarder: upstream attempt failed, upstream={}, error={}", upstream, e);
                continue;
            }
        }
    }

    match send_via(None, &parts, &body_bytes, state.options.timeout).await {
        Ok(resp) => match into_hyper_response(resp).await {
            Ok(r) => {
                ctx.finalize_metrics(r.status().as_u16());
                r
            }
            Err(e) => ctx.error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
        },
        Err(_) => {
            let err = ProxyError::OriginUnreachable(parts.uri.to_string());
            ctx.error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
    }
}

async fn send_via(
    upstream: Option<&UpstreamProxy>,
    parts: &http::request::Parts,
    body: &Bytes,
    timeout: Duration,
) -> Result<reqwest::Response, ProxyError> {
    let client = crate::transport::build_client(upstream, timeout)?;

    let url = reqwest::Url::parse(&parts.uri.to_string())
        .map_err(|_| ProxyError::MalformedProxyUrl(parts.uri.to_string()))?;

    let request = client
        .request(parts.method.clone(), url)
        .headers(parts.headers.clone())
        .body(body.clone())
        .build()
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

    client.execute(request).await.map_err(|e| {
        if e.is_timeout() {
            ProxyError::UpstreamTimeout
        } else {
            ProxyError::UpstreamTransport(e.to_string())
        }
    })
}

async fn into_hyper_response(resp: reqwest::Response) -> Result<Response<BoxBody>, ProxyError> {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }

    let mut response = builder
        .body(full_body(bytes))
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;

    remove_hop_headers(response.headers_mut());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Options, PoolSource, RotatePolicy};
    use crate::pool::{ProxyPool, Rotator};
    use crate::proxy::context::empty_body;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_ctx() -> RequestContext {
        RequestContext::new(
            "GET".to_string(),
            "http://example.com/".to_string(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        )
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let origin = MockServer::start().await;
        let pool = ProxyPool::from_proxies(
            vec![crate::pool::UpstreamProxy::parse(&origin.uri()).unwrap()],
            PoolSource::File(PathBuf::from("x")),
            false,
        )
        .unwrap();
        let state = AppState::for_test(pool, Options::default());

        let req = Request::builder()
            .method("GET")
            .uri("ftp://example.com/")
            .body(empty_body())
            .unwrap();
        let mut ctx = test_ctx();
        let resp = forward(&state, req, &mut ctx).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn falls_back_to_direct_when_upstream_unreachable() {
        let origin = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fallback"))
            .mount(&origin)
            .await;

        let dead_upstream = crate::pool::UpstreamProxy::parse("http://127.0.0.1:1").unwrap();
        let pool = ProxyPool::from_proxies(
            vec![dead_upstream],
            PoolSource::File(PathBuf::from("x")),
            false,
        )
        .unwrap();

        let mut options = Options::default();
        options.timeout = Duration::from_millis(300);
        let state = AppState::for_test(pool, options);

        let req = Request::builder()
            .method("GET")
            .uri(origin.uri())
            .body(empty_body())
            .unwrap();
        let mut ctx = test_ctx();
        let resp = forward(&state, req, &mut ctx).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn every_request_policy_never_repeats_upstream_in_one_request() {
        let pool = ProxyPool::from_proxies(
            vec![
                crate::pool::UpstreamProxy::parse("http://127.0.0.1:1").unwrap(),
                crate::pool::UpstreamProxy::parse("http://127.0.0.1:2").unwrap(),
            ],
            PoolSource::File(PathBuf::from("x")),
            false,
        )
        .unwrap();
        let rotator = Rotator::new(RotatePolicy::EveryRequest);
        let order = rotator.advance_and_order(&pool);
        let mut seen = std::collections::HashSet::new();
        for upstream in &order {
            assert!(seen.insert(upstream.to_string()));
        }
        let _ = Arc::new(pool);
    }
}
