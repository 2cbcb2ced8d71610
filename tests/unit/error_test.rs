//! Tests for error types

use worker_dispatcher::core::DispatchError;

#[test]
fn test_invalid_config_error() {
    let err = DispatchError::InvalidConfig("exec_threads must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: exec_threads must be greater than 0"
    );
}

#[test]
fn test_reporter_closed_error() {
    assert_eq!(DispatchError::ReporterClosed.to_string(), "status reporter is closed");
}

#[test]
fn test_internal_error() {
    let err = DispatchError::Internal("thread spawn failed".to_string());
    assert_eq!(format!("{}", err), "internal error: thread spawn failed");
}
