//! Tests for configuration validation

use std::time::Duration;

use worker_dispatcher::config::DispatcherConfig;

#[test]
fn test_config_builder_setters() {
    let cfg = DispatcherConfig::new()
        .with_exec_threads(8)
        .with_backoff_interval_ms(250)
        .with_poll_interval_ms(20)
        .with_thread_stack_size(512 * 1024);
    assert_eq!(cfg.exec_threads, 8);
    assert_eq!(cfg.backoff_interval(), Duration::from_millis(250));
    assert_eq!(cfg.poll_interval(), Duration::from_millis(20));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_invalid_exec_threads() {
    let cfg = DispatcherConfig::new().with_exec_threads(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_invalid_poll_interval() {
    let cfg = DispatcherConfig::new().with_poll_interval_ms(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_invalid_stack_size() {
    let cfg = DispatcherConfig::new().with_thread_stack_size(1024);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_backoff_is_allowed() {
    let cfg = DispatcherConfig::new().with_backoff_interval_ms(0);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "exec_threads": 16,
        "backoff_interval_ms": 500
    }"#;

    let cfg = DispatcherConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.exec_threads, 16);
    assert_eq!(cfg.backoff_interval_ms, 500);
    assert_eq!(cfg.poll_interval_ms, DispatcherConfig::new().poll_interval_ms);
}

#[test]
fn test_config_from_json_rejects_invalid() {
    assert!(DispatcherConfig::from_json_str(r#"{"exec_threads": 0}"#).is_err());
    assert!(DispatcherConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_env_overrides_defaults() {
    std::env::set_var("WORKER_EXEC_THREADS", "3");
    std::env::set_var("WORKER_BACKOFF_INTERVAL_MS", "75");
    std::env::remove_var("WORKER_POLL_INTERVAL_MS");

    let cfg = DispatcherConfig::from_env().unwrap();
    assert_eq!(cfg.exec_threads, 3);
    assert_eq!(cfg.backoff_interval(), Duration::from_millis(75));
    assert_eq!(cfg.poll_interval_ms, DispatcherConfig::new().poll_interval_ms);

    std::env::set_var("WORKER_EXEC_THREADS", "0");
    assert!(DispatcherConfig::from_env().is_err());

    std::env::remove_var("WORKER_EXEC_THREADS");
    std::env::remove_var("WORKER_BACKOFF_INTERVAL_MS");
}
