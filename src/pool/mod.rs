pub mod rotator;

#[cfg(test)]
mod tests;

pub use rotator::Rotator;

use crate::config::PoolSource;
use crate::error::ProxyError;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::AtomicI64;

/// A single upstream proxy URL, restricted to the schemes the transport
/// factory can actually dial. Construction is the only place scheme
/// validation happens; every other module treats `UpstreamProxy` as already
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamProxy {
    url: String,
    scheme: Scheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Socks5,
    Socks5h,
}

impl UpstreamProxy {
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        let url = reqwest::Url::parse(raw)
            .map_err(|_| ProxyError::MalformedProxyUrl(raw.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            "socks5" => Scheme::Socks5,
            "socks5h" => Scheme::Socks5h,
            other => return Err(ProxyError::UnsupportedScheme(other.to_string())),
        };
        if url.host_str().is_none() {
            return Err(ProxyError::MalformedProxyUrl(raw.to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            scheme,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}

impl std::fmt::Display for UpstreamProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Shape of one entry in a remote JSON proxy feed. Only `protocol`, `proxy`
/// and `check_count` drive behaviour; the remaining fields exist purely so
/// feeds carrying the fuller schema still deserialize instead of erroring.
#[derive(Debug, Deserialize)]
pub struct RemoteProxyFeedItem {
    pub protocol: String,
    pub proxy: String,
    #[serde(default)]
    pub check_count: i64,
    #[serde(default)]
    pub anonymous: Option<String>,
    #[serde(default)]
    pub fail_count: Option<i64>,
    #[serde(default)]
    pub https: Option<bool>,
    #[serde(default)]
    pub last_status: Option<bool>,
    #[serde(default)]
    pub last_time: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// The rotation pool: an ordered, immutable-after-construction list of
/// upstream proxies plus the atomic cursor the rotator advances.
pub struct ProxyPool {
    proxies: Vec<UpstreamProxy>,
    cursor: AtomicI64,
    source: PoolSource,
    remote: bool,
}

impl ProxyPool {
    pub fn from_proxies(proxies: Vec<UpstreamProxy>, source: PoolSource, remote: bool) -> Result<Self, ProxyError> {
        if proxies.is_empty() {
            return Err(ProxyError::EmptyProxyList);
        }
        Ok(Self {
            proxies,
            cursor: AtomicI64::new(-1),
            source,
            remote,
        })
    }

    pub async fn load(source: PoolSource, client: &reqwest::Client) -> Result<Self, ProxyError> {
        match &source {
            PoolSource::File(path) => {
                let proxies = load_from_file(path)?;
                Self::from_proxies(proxies, source, false)
            }
            PoolSource::Remote(url) => {
                let proxies = load_from_remote(url, client).await?;
                Self::from_proxies(proxies, source, true)
            }
        }
    }

    pub fn proxies(&self) -> &[UpstreamProxy] {
        &self.proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn source(&self) -> &PoolSource {
        &self.source
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub(crate) fn cursor(&self) -> &AtomicI64 {
        &self.cursor
    }
}

/// Pre-evaluation hook for per-line macros in a local proxy list (e.g. a
/// templated host/port the original tooling expands before parsing). This
/// rotation engine takes proxy lines verbatim; the hook exists so a richer
/// macro layer can be dropped in without touching the loader around it.
fn eval_macros(line: &str) -> Cow<'_, str> {
    Cow::Borrowed(line)
}

fn load_from_file(path: &Path) -> Result<Vec<UpstreamProxy>, ProxyError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ProxyError::Config(format!("read {}: {}", path.display(), e)))?;

    let mut seen = std::collections::HashSet::new();
    let mut proxies = Vec::new();

    for raw_line in content.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let evaluated = eval_macros(trimmed);
        let candidate = match UpstreamProxy::parse(&evaluated) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if seen.insert(candidate.url.clone()) {
            proxies.push(candidate);
        }
    }

    Ok(proxies)
}

async fn load_from_remote(url: &str, client: &reqwest::Client) -> Result<Vec<UpstreamProxy>, ProxyError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProxyError::FeedParse(format!("fetch {}: {}", url, e)))?;

    let body = response
        .text()
        .await
        .map_err(|e| ProxyError::FeedParse(format!("read {}: {}", url, e)))?;

    let mut items: Vec<RemoteProxyFeedItem> = serde_json::from_str(&body)
        .map_err(|e| ProxyError::FeedParse(format!("decode {}: {}", url, e)))?;

    items.sort_by(|a, b| b.check_count.cmp(&a.check_count));

    let mut seen = std::collections::HashSet::new();
    let mut proxies = Vec::new();

    for item in items {
        let candidate_url = format!("{}://{}", item.protocol, item.proxy);
        let candidate = match UpstreamProxy::parse(&candidate_url) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if seen.insert(candidate.url.clone()) {
            proxies.push(candidate);
        }
    }

    Ok(proxies)
}
