use super::*;
use crate::config::PoolSource;
use crate::pool::ProxyPool;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn ip_info_response_deserializes_expected_shape() {
    let body = r#"{"code":200,"message":"ok","ttl":60,"data":{"ip_addr":"203.0.113.9","mid":"abc"}}"#;
    let parsed: IpInfoResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.code, 200);
    assert_eq!(parsed.data.ip_addr, "203.0.113.9");
    assert_eq!(parsed.data.mid, "abc");
}

#[tokio::test]
async fn check_one_reports_dead_for_unreachable_proxy() {
    let proxy = UpstreamProxy::parse("http://127.0.0.1:1").unwrap();
    let outcome = check_one(&proxy, "https://ipinfo.rotoproxy.dev/json", Duration::from_millis(200)).await;
    match outcome {
        CheckOutcome::Dead { .. } => {}
        other => panic!("expected Dead, got {:?}", other),
    }
}

#[tokio::test]
async fn run_checks_aggregates_dead_outcomes() {
    let proxies = vec![
        UpstreamProxy::parse("http://127.0.0.1:1").unwrap(),
        UpstreamProxy::parse("http://127.0.0.1:2").unwrap(),
    ];
    let pool = ProxyPool::from_proxies(proxies, PoolSource::File(PathBuf::from("x")), false).unwrap();

    let mut options = Options::default();
    options.timeout = Duration::from_millis(200);
    options.max_parallelism = 2;

    let report = run_checks(&pool, &options).await;
    assert_eq!(report.live_count(), 0);
    assert_eq!(report.dead_count(), 2);
}
