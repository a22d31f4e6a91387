pub mod auth;
mod ca;
mod resolver;

pub use ca::{default_ca_paths, Ca};

use crate::error::ProxyError;
use crate::proxy::context::{empty_body, full_body, BoxBody, RequestContext};
use crate::proxy::forwarder;
use crate::server::state::AppState;
use http::{Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use resolver::CertResolver;
use std::net::IpAddr;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

/// Handle an inbound CONNECT request: authenticate it, then either reject it
/// at the tunnel layer or accept and hand the upgraded connection off to
/// `serve_intercepted` to terminate TLS and decrypt it.
pub async fn handle_connect(
    req: Request<Incoming>,
    state: AppState,
    client_ip: IpAddr,
) -> Response<BoxBody> {
    metrics::counter!("rotoproxy_connect_total").increment(1);

    if !auth::check_connect_auth(req.headers(), state.options.auth.as_deref()) {
        warn!("mitm: rejecting CONNECT from {}: {}", client_ip, ProxyError::AuthRejected);
        metrics::counter!("rotoproxy_auth_rejected_total").increment(1);
        return auth_required_response();
    }

    let Some(authority) = req.uri().authority().map(|a| a.to_string()) else {
        return bad_request_response("CONNECT requires an authority-form target");
    };

    debug!("mitm: intercepting CONNECT {} from {}", authority, client_ip);
    metrics::counter!("rotoproxy_mitm_intercepted_total").increment(1);

    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => {
                if let Err(e) =
                    serve_intercepted(TokioIo::new(upgraded), authority, state, client_ip).await
                {
                    warn!("mitm: intercepted connection ended with error: {}", e);
                }
            }
            Err(e) => warn!("mitm: failed to upgrade CONNECT tunnel: {}", e),
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .body(empty_body())
        .unwrap()
}

async fn serve_intercepted<T>(
    stream: T,
    authority: String,
    state: AppState,
    client_ip: IpAddr,
) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(CertResolver::new(state.ca.clone())));
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));

    let tls_stream = acceptor.accept(stream).await?;

    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let state = state.clone();
        let authority = authority.clone();
        async move { Ok::<_, hyper::Error>(handle_decrypted(req, authority, state, client_ip).await) }
    });

    auto::Builder::new(TokioExecutor::new())
        .http1()
        .http2()
        .serve_connection(TokioIo::new(tls_stream), service)
        .await?;

    Ok(())
}

/// Handle one request arriving over an already-decrypted MITM tunnel. The
/// client believes it is speaking TLS directly to `authority`; we rebuild an
/// absolute `https://` URI and hand it to the same forwarder plain HTTP
/// requests use.
async fn handle_decrypted(
    req: Request<Incoming>,
    authority: String,
    state: AppState,
    client_ip: IpAddr,
) -> Response<BoxBody> {
    let (mut parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| http::uri::PathAndQuery::from_static("/"));

    parts.uri = Uri::builder()
        .scheme("https")
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
        .unwrap_or(parts.uri);

    let req = Request::from_parts(parts, body.boxed());

    let mut ctx = RequestContext::new(
        req.method().to_string(),
        req.uri().to_string(),
        client_ip,
    );

    forwarder::forward(&state, req, &mut ctx).await
}

fn auth_required_response() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::PROXY_AUTHENTICATION_REQUIRED)
        .header("Proxy-Authenticate", "Basic realm=\"rotoproxy\"")
        .body(full_body("Proxy Authentication Required"))
        .unwrap()
}

fn bad_request_response(msg: &str) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(full_body(msg.to_string()))
        .unwrap()
}
