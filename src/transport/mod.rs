#[cfg(test)]
mod tests;

use crate::error::ProxyError;
use crate::pool::UpstreamProxy;
use std::time::Duration;

/// Builds the `reqwest::Client` used to actually dial a request, either
/// directly or through a candidate upstream proxy. A fresh client is built
/// per use rather than cached and reused across rotations: reqwest tears
/// down its connection pool when the client is dropped, which is this
/// engine's equivalent of releasing idle connections between proxy swaps.
pub fn build_client(upstream: Option<&UpstreamProxy>, timeout: Duration) -> Result<reqwest::Client, ProxyError> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none());

    if let Some(proxy) = upstream {
        let proxy_url = reqwest::Url::parse(proxy.as_str())
            .map_err(|_| ProxyError::MalformedProxyUrl(proxy.as_str().to_string()))?;
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))?;
        builder = builder.proxy(proxy);
    } else {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| ProxyError::UpstreamTransport(e.to_string()))
}
