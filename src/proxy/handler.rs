use crate::mitm;
use crate::proxy::context::{full_body, BoxBody, RequestContext};
use crate::proxy::forwarder;
use crate::server::state::AppState;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use std::net::SocketAddr;

/// Top-level request router for the serve frontend: demultiplexes CONNECT,
/// absolute-form proxy requests, and everything else (the non-proxy routes).
pub async fn dispatch(
    req: Request<Incoming>,
    state: AppState,
    peer_addr: SocketAddr,
) -> Result<Response<BoxBody>, hyper::Error> {
    if req.method() == http::Method::CONNECT {
        return Ok(mitm::handle_connect(req, state, peer_addr.ip()).await);
    }

    if req.uri().scheme().is_some() {
        let mut ctx = RequestContext::new(
            req.method().to_string(),
            req.uri().to_string(),
            peer_addr.ip(),
        );
        let req = req.map(|b| b.boxed());
        return Ok(forwarder::forward(&state, req, &mut ctx).await);
    }

    Ok(non_proxy_route(&req, &state))
}

/// Handles requests that are neither CONNECT nor absolute-form: anything
/// arriving at this frontend directly rather than through a client's proxy
/// configuration. Only `/cert` (the MITM CA, as a DER attachment) is served;
/// everything else gets a fixed 500 explaining this isn't a normal endpoint.
fn non_proxy_route(req: &Request<Incoming>, state: &AppState) -> Response<BoxBody> {
    let mut response = if req.uri().path() == "/cert" {
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/x-x509-ca-cert")
            .header(
                "Content-Disposition",
                "attachment; filename=goproxy-cacert.der",
            )
            .body(full_body(state.ca.root_der().to_vec()))
            .unwrap()
    } else {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(full_body(
                "this endpoint does not serve non-proxy requests",
            ))
            .unwrap()
    };

    if let Some(version) = &state.options.version {
        response.headers_mut().insert(
            "X-Mubeng-Version",
            http::HeaderValue::from_str(version)
                .unwrap_or_else(|_| http::HeaderValue::from_static("")),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Options, PoolSource};
    use crate::pool::{ProxyPool, UpstreamProxy};
    use std::path::PathBuf;

    fn test_state(version: Option<&str>) -> AppState {
        let pool = ProxyPool::from_proxies(
            vec![UpstreamProxy::parse("http://127.0.0.1:1").unwrap()],
            PoolSource::File(PathBuf::from("x")),
            false,
        )
        .unwrap();
        let mut options = Options::default();
        options.version = version.map(str::to_string);
        AppState::for_test(pool, options)
    }

    #[test]
    fn ca_root_der_is_nonempty() {
        let state = test_state(None);
        assert!(!state.ca.root_der().is_empty());
    }
}
