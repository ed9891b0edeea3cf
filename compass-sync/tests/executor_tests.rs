mod common;

use common::record;
use compass_sync::remote::mock::MockRemoteStore;
use compass_sync::{ExecutionError, MutationExecutor, RemoteError};
use compass_types::{ActionKind, QueuedAction};
use serde_json::json;
use std::sync::Arc;

fn make_executor() -> (Arc<MockRemoteStore>, MutationExecutor) {
    let remote = Arc::new(MockRemoteStore::new());
    let executor = MutationExecutor::new(remote.clone());
    (remote, executor)
}

// ── Dispatch ─────────────────────────────────────────────────────

#[tokio::test]
async fn create_inserts_and_returns_row() {
    let (remote, executor) = make_executor();
    let action = QueuedAction::create("posts", record(json!({"title": "a"})), Some("temp-x".into()));

    let row = executor.execute(&action).await.unwrap().unwrap();
    assert_eq!(row["title"], json!("a"));
    assert_eq!(row["id"], json!("row-1"));
    // The provisional id never reaches the store.
    assert_eq!(remote.rows("posts"), vec![row]);
}

#[tokio::test]
async fn update_patches_existing_row() {
    let (remote, executor) = make_executor();
    remote.seed("posts", "7", record(json!({"title": "old", "body": "x"})));

    let action = QueuedAction::update("posts", "7", record(json!({"title": "new"})));
    let row = executor.execute(&action).await.unwrap().unwrap();

    assert_eq!(row["title"], json!("new"));
    assert_eq!(row["body"], json!("x"));
}

#[tokio::test]
async fn delete_removes_row() {
    let (remote, executor) = make_executor();
    remote.seed("posts", "7", record(json!({})));

    let result = executor.execute(&QueuedAction::delete("posts", "7")).await.unwrap();
    assert!(result.is_none());
    assert!(remote.row("posts", "7").is_none());

    let calls = remote.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, ActionKind::Delete);
    assert_eq!(calls[0].record_id.as_deref(), Some("7"));
}

// ── Classification ───────────────────────────────────────────────

#[tokio::test]
async fn missing_row_is_rejected() {
    let (_remote, executor) = make_executor();
    let err = executor
        .execute(&QueuedAction::update("posts", "missing-id", record(json!({"title": "b"}))))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Rejected(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn network_and_timeout_are_transient() {
    let (remote, executor) = make_executor();
    let action = QueuedAction::delete("posts", "1");

    remote.fail_next(RemoteError::Network("connection reset".into()));
    let err = executor.execute(&action).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Transient(_)));

    remote.fail_next(RemoteError::Timeout);
    let err = executor.execute(&action).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Transient(_)));
    assert!(err.is_retryable());
}

#[test]
fn remote_errors_map_to_execution_errors() {
    let cases = [
        (RemoteError::Network("x".into()), "transient"),
        (RemoteError::Timeout, "transient"),
        (RemoteError::Unavailable { status: 503, message: "busy".into() }, "transient"),
        (RemoteError::Unauthorized { status: 401, message: "JWT expired".into() }, "transient"),
        (RemoteError::Rejected { status: 422, message: "bad".into() }, "rejected"),
        (RemoteError::NotFound("posts/1".into()), "rejected"),
        (RemoteError::Other("??".into()), "unknown"),
    ];
    for (remote, expected) in cases {
        let label = match ExecutionError::from(remote.clone()) {
            ExecutionError::Transient(_) => "transient",
            ExecutionError::Rejected(_) => "rejected",
            ExecutionError::Unknown(_) => "unknown",
        };
        assert_eq!(label, expected, "{remote:?}");
    }
}

#[test]
fn unknown_is_retryable() {
    assert!(ExecutionError::Unknown("?".into()).is_retryable());
}

#[tokio::test]
async fn executor_has_no_side_effects_on_failure() {
    let (remote, executor) = make_executor();
    remote.fail_next(RemoteError::Rejected { status: 400, message: "invalid".into() });
    let action = QueuedAction::create("posts", record(json!({"title": ""})), None);
    assert!(executor.execute(&action).await.is_err());
    assert!(remote.rows("posts").is_empty());
    assert_eq!(action.attempts, 0);
}
