use std::fmt;

/// Error taxonomy for the rotation/forwarding engine. Kinds, not wrapped
/// libraries — callers match on the variant, not on a nested error chain.
#[derive(Debug)]
pub enum ProxyError {
    Config(String),
    EmptyProxyList,
    MalformedProxyUrl(String),
    UnsupportedScheme(String),
    UpstreamTransport(String),
    UpstreamTimeout,
    UpstreamRejected(u16),
    OriginUnreachable(String),
    AuthRejected,
    FeedParse(String),
    IpInfoParse(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "config error: {}", msg),
            ProxyError::EmptyProxyList => write!(f, "no valid proxy URLs"),
            ProxyError::MalformedProxyUrl(url) => write!(f, "malformed proxy url: {}", url),
            ProxyError::UnsupportedScheme(scheme) => write!(f, "unsupported scheme: {}", scheme),
            ProxyError::UpstreamTransport(msg) => write!(f, "upstream transport error: {}", msg),
            ProxyError::UpstreamTimeout => write!(f, "upstream timeout"),
            ProxyError::UpstreamRejected(status) => {
                write!(f, "upstream rejected request, status={}", status)
            }
            ProxyError::OriginUnreachable(url) => {
                write!(f, "no proxy can request {}", url)
            }
            ProxyError::AuthRejected => write!(f, "proxy authentication rejected"),
            ProxyError::FeedParse(msg) => write!(f, "proxy feed parse error: {}", msg),
            ProxyError::IpInfoParse(msg) => write!(f, "ip info parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}
