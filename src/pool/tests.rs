use super::*;
use crate::config::{PoolSource, RotatePolicy};
use std::path::PathBuf;

fn pool_of(urls: &[&str]) -> ProxyPool {
    let proxies = urls.iter().map(|u| UpstreamProxy::parse(u).unwrap()).collect();
    ProxyPool::from_proxies(proxies, PoolSource::File(PathBuf::from("test.txt")), false).unwrap()
}

#[test]
fn parse_accepts_supported_schemes() {
    assert!(UpstreamProxy::parse("http://10.0.0.1:8080").is_ok());
    assert!(UpstreamProxy::parse("https://10.0.0.1:8080").is_ok());
    assert!(UpstreamProxy::parse("socks5://10.0.0.1:1080").is_ok());
    assert!(UpstreamProxy::parse("socks5h://10.0.0.1:1080").is_ok());
}

#[test]
fn parse_rejects_unsupported_scheme() {
    match UpstreamProxy::parse("ftp://10.0.0.1:21") {
        Err(ProxyError::UnsupportedScheme(s)) => assert_eq!(s, "ftp"),
        other => panic!("expected UnsupportedScheme, got {:?}", other),
    }
}

#[test]
fn parse_rejects_malformed_url() {
    assert!(UpstreamProxy::parse("not a url").is_err());
}

#[test]
fn from_proxies_rejects_empty_list() {
    let err = ProxyPool::from_proxies(vec![], PoolSource::File(PathBuf::from("x")), false);
    assert!(matches!(err, Err(ProxyError::EmptyProxyList)));
}

#[test]
fn every_request_rotates_in_order_and_wraps() {
    let pool = pool_of(&["http://a:1", "http://b:2", "http://c:3"]);
    let rotator = Rotator::new(RotatePolicy::EveryRequest);
    let picks: Vec<_> = (0..4).map(|_| rotator.next(&pool).to_string()).collect();
    assert_eq!(
        picks,
        vec!["http://a:1/", "http://b:2/", "http://c:3/", "http://a:1/"]
    );
}

#[test]
fn every_n_holds_cursor_between_advances() {
    let pool = pool_of(&["http://a:1", "http://b:2", "http://c:3"]);
    let rotator = Rotator::new(RotatePolicy::EveryN { n: 2 });
    let picks: Vec<_> = (0..4).map(|_| rotator.next(&pool).to_string()).collect();
    assert_eq!(
        picks,
        vec!["http://a:1/", "http://a:1/", "http://b:2/", "http://b:2/"]
    );
}

#[test]
fn random_policy_always_picks_within_bounds() {
    let pool = pool_of(&["http://a:1", "http://b:2"]);
    let rotator = Rotator::new(RotatePolicy::Random);
    for _ in 0..20 {
        let pick = rotator.next(&pool).to_string();
        assert!(pick == "http://a:1/" || pick == "http://b:2/");
    }
}

#[test]
fn advance_and_order_wraps_exactly_once() {
    let pool = pool_of(&["http://a:1", "http://b:2", "http://c:3"]);
    let rotator = Rotator::new(RotatePolicy::EveryRequest);
    let order = rotator.advance_and_order(&pool);
    assert_eq!(order.len(), 3);
    let urls: Vec<_> = order.iter().map(|p| p.to_string()).collect();
    assert_eq!(urls, vec!["http://a:1/", "http://b:2/", "http://c:3/"]);

    let order2 = rotator.advance_and_order(&pool);
    let urls2: Vec<_> = order2.iter().map(|p| p.to_string()).collect();
    assert_eq!(urls2, vec!["http://b:2/", "http://c:3/", "http://a:1/"]);
}

#[test]
fn iterate_from_cursor_does_not_advance() {
    let pool = pool_of(&["http://a:1", "http://b:2"]);
    let rotator = Rotator::new(RotatePolicy::EveryRequest);
    let first = rotator.iterate_from_cursor(&pool);
    let second = rotator.iterate_from_cursor(&pool);
    assert_eq!(
        first.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        second.iter().map(|p| p.to_string()).collect::<Vec<_>>()
    );
}
