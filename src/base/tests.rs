use crate::base::error::LoadError;
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;

#[test]
fn test_net_error_roundtrip() {
    // Standard Chromium error
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    // Custom error
    let custom = NetError::MalformedMultipart;
    let custom_code = custom.as_i32();
    assert_eq!(custom_code, -10000);
    assert!(matches!(NetError::from(custom_code), NetError::MalformedMultipart));
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
    assert_eq!(err.as_i32(), -9999);
}

#[test]
fn test_abort_classification() {
    assert!(NetError::Aborted.is_abort());
    assert!(!NetError::ConnectionReset.is_abort());
}

#[test]
fn test_terminal_states() {
    assert!(LoadState::Finished.is_terminal());
    assert!(LoadState::Cancelled.is_terminal());
    assert!(LoadState::Failed.is_terminal());
    assert!(!LoadState::Streaming.is_terminal());
    assert!(LoadState::AwaitingContentPolicy.is_awaiting_policy());
    assert!(!LoadState::Loading.is_awaiting_policy());
}

#[test]
fn test_load_error_wraps_net_error() {
    let err: LoadError = NetError::TimedOut.into();
    assert_eq!(err.net_error(), Some(NetError::TimedOut));
    assert!(!err.is_policy_interruption());
    assert_eq!(err.to_string(), "Transport failure: Operation timed out");
}

#[test]
fn test_invalid_state_message() {
    let err = LoadError::invalid_state("start", LoadState::Loading);
    assert_eq!(
        err.to_string(),
        "Operation `start` is not valid in state loading"
    );
}
