use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_timeout_secs() -> f64 {
    10.0
}

fn default_parallelism() -> usize {
    10
}

fn default_upstream_reject_status() -> u16 {
    501
}

/// Default target used by the liveness checker to resolve the exit IP seen
/// through a candidate proxy. Overridable via config for self-hosted mirrors
/// or air-gapped environments; the response envelope is always the
/// `{code, message, ttl, data: {ip_addr, mid}}` shape `checker::IpInfoResponse`
/// deserializes.
fn default_ipinfo_endpoint() -> String {
    "https://ipinfo.rotoproxy.dev/json".to_string()
}

/// Rotation policy applied on each inbound request. `EveryN` advances the
/// cursor once per N calls; `Random` ignores the cursor entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RotatePolicy {
    EveryRequest,
    EveryN { n: u64 },
    Random,
}

impl Default for RotatePolicy {
    fn default() -> Self {
        RotatePolicy::EveryRequest
    }
}

/// Runtime options. Layered the same way the gateway's infrastructure
/// config is layered: built-in defaults, then an optional TOML/JSON file,
/// then CLI flags take final precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub listen_addr: String,
    pub admin_listen: Option<String>,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub sync: bool,
    pub rotate: RotatePolicy,
    pub auth: Option<String>,
    pub verbose: bool,
    pub output_path: Option<PathBuf>,
    pub max_parallelism: usize,
    /// HTTP status an upstream proxy uses to say "I refused to proxy this
    /// request" rather than "the origin itself returned this status".
    /// Configurable per the design notes' open question instead of being
    /// hard-coded.
    pub upstream_reject_status: u16,
    pub version: Option<String>,
    pub ca_cert_path: Option<PathBuf>,
    pub ca_key_path: Option<PathBuf>,
    #[serde(default = "default_ipinfo_endpoint")]
    pub ipinfo_endpoint: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            admin_listen: None,
            timeout: Duration::from_secs_f64(default_timeout_secs()),
            sync: false,
            rotate: RotatePolicy::default(),
            auth: None,
            verbose: false,
            output_path: None,
            max_parallelism: default_parallelism(),
            upstream_reject_status: default_upstream_reject_status(),
            version: None,
            ca_cert_path: None,
            ca_key_path: None,
            ipinfo_endpoint: default_ipinfo_endpoint(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Where the proxy pool is sourced from. Resolved once at startup from the
/// CLI's `--source` value and then handed to `ProxyPool::load`.
#[derive(Debug, Clone)]
pub enum PoolSource {
    File(PathBuf),
    Remote(String),
}

impl PoolSource {
    /// A bare string is a remote feed when it parses as an absolute HTTP(S)
    /// URL, otherwise it is treated as a local file path.
    pub fn detect(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            PoolSource::Remote(source.to_string())
        } else {
            PoolSource::File(PathBuf::from(source))
        }
    }
}
