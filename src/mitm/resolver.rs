use super::ca::Ca;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use std::sync::Arc;
use tracing::warn;

/// Resolves a fresh (or cached) leaf certificate per SNI hostname against
/// the long-lived MITM `Ca`. Installed as the single cert resolver on the
/// `rustls::ServerConfig` used to terminate every intercepted CONNECT
/// tunnel; rustls calls `resolve` once per TLS handshake.
pub struct CertResolver {
    ca: Arc<Ca>,
}

impl CertResolver {
    pub fn new(ca: Arc<Ca>) -> Self {
        Self { ca }
    }
}

impl ResolvesServerCert for CertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let host = client_hello.server_name()?;
        match self.ca.cert_for_host(host) {
            Ok(certified) => Some(certified),
            Err(e) => {
                warn!("mitm: failed to sign leaf cert for host={}: {}", host, e);
                None
            }
        }
    }
}
