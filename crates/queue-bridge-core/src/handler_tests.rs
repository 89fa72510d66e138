use super::*;
use serde_json::json;

#[test]
fn test_only_retryable_outcome_skips_acknowledgement() {
    assert!(DispatchOutcome::Success.acknowledges());
    assert!(DispatchOutcome::permanent("bad").acknowledges());
    assert!(!DispatchOutcome::retryable("busy").acknowledges());
}

#[tokio::test]
async fn test_log_only_handler_succeeds() {
    let outcome = LogOnlyHandler
        .handle(&Event::new("e-1", json!({"k": "v"})))
        .await;
    assert_eq!(outcome, DispatchOutcome::Success);
}
