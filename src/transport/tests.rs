use super::*;
use crate::pool::UpstreamProxy;
use std::time::Duration;

#[test]
fn builds_direct_client_with_no_upstream() {
    let client = build_client(None, Duration::from_secs(5));
    assert!(client.is_ok());
}

#[test]
fn builds_client_for_http_upstream() {
    let upstream = UpstreamProxy::parse("http://127.0.0.1:8888").unwrap();
    let client = build_client(Some(&upstream), Duration::from_secs(5));
    assert!(client.is_ok());
}

#[test]
fn builds_client_for_socks5_upstream() {
    let upstream = UpstreamProxy::parse("socks5://127.0.0.1:1080").unwrap();
    let client = build_client(Some(&upstream), Duration::from_secs(5));
    assert!(client.is_ok());
}
