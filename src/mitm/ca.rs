use crate::error::ProxyError;
use dashmap::DashMap;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, Error as RcgenError, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::CertifiedKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::{Duration as TimeDuration, OffsetDateTime};

/// The long-lived MITM certificate authority plus a cache of per-host leaf
/// certificates signed by it. One `Ca` is built at process start and shared
/// across every intercepted CONNECT tunnel.
pub struct Ca {
    root_der: CertificateDer<'static>,
    root_cert: rcgen::Certificate,
    root_key: KeyPair,
    leaves: DashMap<String, Arc<CertifiedKey>>,
}

impl Ca {
    /// Load a CA from an existing cert/key PEM pair, or generate a fresh
    /// self-signed one and persist it to `cert_path`/`key_path` if given.
    /// With no paths at all, the CA is generated in memory and lives only
    /// for this process (fine for ad-hoc runs; `--ca-cert`/`--ca-key` make
    /// it durable across restarts so clients only have to trust it once).
    pub fn load_or_generate(
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, ProxyError> {
        if let (Some(cert_path), Some(key_path)) = (cert_path, key_path) {
            if cert_path.exists() && key_path.exists() {
                return Self::from_pem_files(cert_path, key_path);
            }
        }

        let ca = Self::generate()?;

        if let (Some(cert_path), Some(key_path)) = (cert_path, key_path) {
            if let Some(parent) = cert_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(cert_path, ca.root_cert.pem())
                .map_err(|e| ProxyError::Config(format!("write ca cert: {}", e)))?;
            std::fs::write(key_path, ca.root_key.serialize_pem())
                .map_err(|e| ProxyError::Config(format!("write ca key: {}", e)))?;
        }

        Ok(ca)
    }

    fn generate() -> Result<Self, ProxyError> {
        let mut params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| rcgen_err(e))?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "rotoproxy MITM CA");
        dn.push(DnType::OrganizationName, "rotoproxy");
        params.distinguished_name = dn;
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
        ];
        let not_before = OffsetDateTime::now_utc().saturating_sub(TimeDuration::days(1));
        params.not_before = not_before;
        params.not_after = not_before
            .checked_add(TimeDuration::days(3650))
            .unwrap_or(not_before);

        let key_pair = KeyPair::generate().map_err(rcgen_err)?;
        let cert = params.self_signed(&key_pair).map_err(rcgen_err)?;
        let der = cert.der().clone();

        Ok(Self {
            root_der: der,
            root_cert: cert,
            root_key: key_pair,
            leaves: DashMap::new(),
        })
    }

    fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, ProxyError> {
        let cert_pem = std::fs::read_to_string(cert_path)
            .map_err(|e| ProxyError::Config(format!("read ca cert: {}", e)))?;
        let key_pem = std::fs::read_to_string(key_path)
            .map_err(|e| ProxyError::Config(format!("read ca key: {}", e)))?;

        let key_pair = KeyPair::from_pem(&key_pem).map_err(rcgen_err)?;

        let mut params = CertificateParams::from_ca_cert_pem(&cert_pem).map_err(rcgen_err)?;
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key_pair).map_err(rcgen_err)?;
        let der = cert.der().clone();

        Ok(Self {
            root_der: der,
            root_cert: cert,
            root_key: key_pair,
            leaves: DashMap::new(),
        })
    }

    /// The CA certificate in DER form, served verbatim on `GET /cert`.
    pub fn root_der(&self) -> &[u8] {
        self.root_der.as_ref()
    }

    /// Fetch (or lazily generate and cache) a leaf certificate for `host`,
    /// signed by this CA, packaged as the `CertifiedKey` rustls needs to
    /// terminate TLS for that SNI name.
    pub fn cert_for_host(&self, host: &str) -> Result<Arc<CertifiedKey>, ProxyError> {
        if let Some(existing) = self.leaves.get(host) {
            return Ok(existing.clone());
        }

        let certified = self.sign_leaf(host)?;
        self.leaves.insert(host.to_string(), certified.clone());
        Ok(certified)
    }

    fn sign_leaf(&self, host: &str) -> Result<Arc<CertifiedKey>, ProxyError> {
        let mut params = CertificateParams::new(vec![host.to_string()]).map_err(rcgen_err)?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, host);
        params.distinguished_name = dn;
        params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
        params.key_usages = vec![rcgen::KeyUsagePurpose::DigitalSignature];
        let not_before = OffsetDateTime::now_utc().saturating_sub(TimeDuration::days(1));
        params.not_before = not_before;
        params.not_after = not_before
            .checked_add(TimeDuration::days(397))
            .unwrap_or(not_before);

        let leaf_key = KeyPair::generate().map_err(rcgen_err)?;
        let leaf_cert = params
            .signed_by(&leaf_key, &self.root_cert, &self.root_key)
            .map_err(rcgen_err)?;

        let key_der = PrivatePkcs8KeyDer::from(leaf_key.serialize_der());
        let signing_key = rustls::crypto::ring::sign::any_supported_type(&PrivateKeyDer::Pkcs8(key_der))
            .map_err(|e| ProxyError::Config(format!("unsupported leaf key for {}: {}", host, e)))?;

        let chain = vec![leaf_cert.der().clone(), self.root_der.clone()];
        Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
    }
}

fn rcgen_err(e: RcgenError) -> ProxyError {
    ProxyError::Config(format!("ca: {}", e))
}

/// Default on-disk location for a persisted CA when the caller didn't
/// specify `--ca-cert`/`--ca-key` explicitly.
pub fn default_ca_paths() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join("rotoproxy-ca");
    (dir.join("rootCA.pem"), dir.join("rootCA.key.pem"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_self_signed_ca() {
        let ca = Ca::generate().unwrap();
        assert!(!ca.root_der().is_empty());
    }

    #[test]
    fn caches_leaf_certs_per_host() {
        let ca = Ca::generate().unwrap();
        let first = ca.cert_for_host("example.com").unwrap();
        let second = ca.cert_for_host("example.com").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_hosts_get_distinct_certs() {
        let ca = Ca::generate().unwrap();
        let a = ca.cert_for_host("a.example.com").unwrap();
        let b = ca.cert_for_host("b.example.com").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn roundtrips_through_pem_files() {
        let tmp = std::env::temp_dir().join(format!("rotoproxy-ca-test-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let cert_path = tmp.join("ca.pem");
        let key_path = tmp.join("ca.key.pem");

        let ca = Ca::load_or_generate(Some(&cert_path), Some(&key_path)).unwrap();
        assert!(cert_path.exists());
        assert!(key_path.exists());

        let reloaded = Ca::load_or_generate(Some(&cert_path), Some(&key_path)).unwrap();
        assert_eq!(ca.root_der(), reloaded.root_der());

        std::fs::remove_dir_all(&tmp).ok();
    }
}
