//! Tests for transport error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(TransportError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(TransportError::Throttled {
        message: "slow down".to_string(),
    }
    .is_transient());

    assert!(TransportError::Timeout {
        duration: Duration::from_secs(30),
    }
    .is_transient());

    assert!(!TransportError::NotFound {
        name: "orders".to_string(),
    }
    .is_transient());

    assert!(!TransportError::AuthenticationFailed {
        message: "bad signature".to_string(),
    }
    .is_transient());

    assert!(!TransportError::MessageTooLarge {
        size: 1000,
        max_size: 500
    }
    .is_transient());
}

#[test]
fn test_error_kind_names() {
    let error = TransportError::ReceiptNotFound {
        receipt: "abc".to_string(),
    };
    assert_eq!(error.kind(), "receipt_not_found");

    let error = TransportError::ProviderError {
        provider: "AwsSqs".to_string(),
        code: "InternalError".to_string(),
        message: "boom".to_string(),
    };
    assert_eq!(error.kind(), "provider_error");
    assert!(error.to_string().contains("InternalError"));
}
