use super::types::*;
use super::Options;

#[test]
fn test_defaults() {
    let opts = Options::default();
    assert_eq!(opts.listen_addr, "0.0.0.0:8080");
    assert_eq!(opts.max_parallelism, 10);
    assert_eq!(opts.rotate, RotatePolicy::EveryRequest);
    assert_eq!(opts.upstream_reject_status, 501);
}

#[test]
fn test_load_toml_config() {
    let toml_str = r#"
listen_addr = "127.0.0.1:9000"
sync = true
max_parallelism = 32

[rotate]
policy = "every_n"
n = 5
"#;
    let tmp = std::env::temp_dir().join("rotoproxy_test_config.toml");
    std::fs::write(&tmp, toml_str).unwrap();
    let opts = Options::load(Some(&tmp)).unwrap();
    std::fs::remove_file(&tmp).ok();

    assert_eq!(opts.listen_addr, "127.0.0.1:9000");
    assert!(opts.sync);
    assert_eq!(opts.max_parallelism, 32);
    assert_eq!(opts.rotate, RotatePolicy::EveryN { n: 5 });
}

#[test]
fn test_load_json_config() {
    let json = r#"{"listen_addr": "0.0.0.0:7000", "verbose": true}"#;
    let tmp = std::env::temp_dir().join("rotoproxy_test_config.json");
    std::fs::write(&tmp, json).unwrap();
    let opts = Options::load(Some(&tmp)).unwrap();
    std::fs::remove_file(&tmp).ok();

    assert_eq!(opts.listen_addr, "0.0.0.0:7000");
    assert!(opts.verbose);
}

#[test]
fn test_load_missing_file_errors() {
    let missing = std::env::temp_dir().join("rotoproxy_does_not_exist.toml");
    assert!(Options::load(Some(&missing)).is_err());
}

#[test]
fn test_load_none_uses_defaults() {
    let opts = Options::load(None).unwrap();
    assert_eq!(opts.listen_addr, Options::default().listen_addr);
}

#[test]
fn test_validate_rejects_empty_listen_addr() {
    let opts = Options {
        listen_addr: String::new(),
        ..Options::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_parallelism() {
    let opts = Options {
        max_parallelism: 0,
        ..Options::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn test_validate_rejects_every_n_zero() {
    let opts = Options {
        rotate: RotatePolicy::EveryN { n: 0 },
        ..Options::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn test_validate_accepts_defaults() {
    assert!(Options::default().validate().is_ok());
}

#[test]
fn test_env_override_auth() {
    std::env::set_var("ROTOPROXY_AUTH", "u:p");
    let mut opts = Options::default();
    opts.apply_env_overrides();
    std::env::remove_var("ROTOPROXY_AUTH");
    assert_eq!(opts.auth.as_deref(), Some("u:p"));
}

#[test]
fn test_pool_source_detect() {
    assert!(matches!(
        PoolSource::detect("https://example.com/feed.json"),
        PoolSource::Remote(_)
    ));
    assert!(matches!(
        PoolSource::detect("proxies.txt"),
        PoolSource::File(_)
    ));
}
