#[cfg(test)]
mod tests;

use crate::config::Options;
use crate::error::ProxyError;
use crate::pool::{ProxyPool, UpstreamProxy};
use crate::transport;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::io::Write;
use std::sync::Mutex;
use tracing::{debug, info};

/// Envelope returned by the IP-info lookup used to confirm a proxy is alive
/// and to report the exit address it's seen through. Field names mirror the
/// lookup service's JSON shape exactly, not Rust convention.
#[derive(Debug, Deserialize)]
pub struct IpInfoResponse {
    pub code: i32,
    pub message: String,
    pub ttl: i32,
    pub data: IpInfoData,
}

#[derive(Debug, Deserialize)]
pub struct IpInfoData {
    pub ip_addr: String,
    #[serde(default)]
    pub mid: String,
}

#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Live { proxy: String, ip_addr: String },
    Dead { proxy: String, reason: String },
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub live: Vec<String>,
    pub dead: Vec<String>,
}

impl CheckReport {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }
}

/// Run one round of liveness checks across every proxy in the pool, bounded
/// to `options.max_parallelism` concurrent probes. Live proxies are appended
/// to `options.output_path`, if set, in completion order.
pub async fn run_checks(pool: &ProxyPool, options: &Options) -> CheckReport {
    let concurrency = options.max_parallelism;
    let timeout = options.timeout;
    let endpoint = options.ipinfo_endpoint.clone();
    let verbose = options.verbose;

    let output = options.output_path.as_ref().map(|path| {
        Mutex::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .expect("open checker output file"),
        )
    });

    let outcomes: Vec<CheckOutcome> = stream::iter(pool.proxies().to_vec())
        .map(|proxy| {
            let endpoint = endpoint.clone();
            async move { check_one(&proxy, &endpoint, timeout).await }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = CheckReport::default();
    for outcome in &outcomes {
        match outcome {
            CheckOutcome::Live { proxy, ip_addr } => {
                info!("[LIVE] [{}] {}", ip_addr, proxy);
                metrics::counter!("rotoproxy_checker_live_total").increment(1);
                report.live.push(proxy.clone());
                if let Some(file) = &output {
                    let mut file = file.lock().unwrap();
                    let _ = writeln!(file, "{}", proxy);
                }
            }
            CheckOutcome::Dead { proxy, reason } => {
                if verbose {
                    debug!("[DIED] {} ({})", proxy, reason);
                }
                metrics::counter!("rotoproxy_checker_dead_total").increment(1);
                report.dead.push(proxy.clone());
            }
        }
    }

    report
}

async fn check_one(proxy: &UpstreamProxy, endpoint: &str, timeout: std::time::Duration) -> CheckOutcome {
    let client = match transport::build_client(Some(proxy), timeout) {
        Ok(c) => c,
        Err(e) => {
            return CheckOutcome::Dead {
                proxy: proxy.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let result = client
        .get(endpoint)
        .header("Connection", "close")
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => match resp.json::<IpInfoResponse>().await {
            Ok(info) => CheckOutcome::Live {
                proxy: proxy.to_string(),
                ip_addr: info.data.ip_addr,
            },
            Err(e) => CheckOutcome::Dead {
                proxy: proxy.to_string(),
                reason: ProxyError::IpInfoParse(e.to_string()).to_string(),
            },
        },
        Ok(resp) => CheckOutcome::Dead {
            proxy: proxy.to_string(),
            reason: format!("status {}", resp.status()),
        },
        Err(e) => CheckOutcome::Dead {
            proxy: proxy.to_string(),
            reason: e.to_string(),
        },
    }
}
