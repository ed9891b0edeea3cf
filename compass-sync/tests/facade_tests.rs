mod common;

use common::{record, Harness};
use compass_sync::{Connectivity, ExecutionError, MutationResult, RemoteError, SyncConfig, SyncError};
use compass_types::Mutation;
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Online ───────────────────────────────────────────────────────

#[tokio::test]
async fn online_create_returns_confirmed_row() {
    let h = Harness::new(Connectivity::Online).await;
    let result = h.app.create_offline("posts", record(json!({"title": "a"}))).await.unwrap();

    assert!(!result.is_provisional());
    assert_eq!(
        result,
        MutationResult::Confirmed(Some(record(json!({"id": "row-1", "title": "a"}))))
    );
    assert_eq!(h.app.sync_status().pending_count, 0);
}

#[tokio::test]
async fn online_errors_propagate_without_queueing() {
    let h = Harness::new(Connectivity::Online).await;
    h.remote.fail_next(RemoteError::Network("unreachable".into()));

    let err = h
        .app
        .update_offline("posts", "1", record(json!({"title": "b"})))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Execution(ExecutionError::Transient(_))));
    assert_eq!(h.app.sync_status().pending_count, 0);
    assert!(h.coordinator.pending_actions().await.is_empty());
}

#[tokio::test]
async fn online_delete_of_missing_row_is_rejected() {
    let h = Harness::new(Connectivity::Online).await;
    let err = h.app.delete_offline("posts", "nope").await.unwrap_err();
    assert!(matches!(err, SyncError::Execution(ExecutionError::Rejected(_))));
}

#[tokio::test]
async fn online_delete_is_confirmed_without_row() {
    let h = Harness::new(Connectivity::Online).await;
    h.remote.seed("posts", "1", record(json!({})));
    let result = h.app.delete_offline("posts", "1").await.unwrap();
    assert_eq!(result, MutationResult::Confirmed(None));
    assert!(result.record().is_none());
}

// ── Offline ──────────────────────────────────────────────────────

#[tokio::test]
async fn offline_create_returns_marked_temporary_id() {
    let h = Harness::new(Connectivity::Offline).await;
    let result = h.app.create_offline("posts", record(json!({"title": "a"}))).await.unwrap();

    assert!(result.is_provisional());
    let row = result.record().unwrap();
    assert_eq!(row["title"], json!("a"));
    let temp_id = row["id"].as_str().unwrap();
    assert!(temp_id.starts_with("temp-"));

    let pending = h.coordinator.pending_actions().await;
    assert_eq!(pending.len(), 1);
    match &pending[0].mutation {
        Mutation::Create { record: queued, temp_id: queued_temp } => {
            assert!(!queued.contains_key("id"), "temporary id must not be sent");
            assert_eq!(queued_temp.as_deref(), Some(temp_id));
        }
        other => panic!("expected create, got {other:?}"),
    }
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn offline_update_echoes_changes() {
    let h = Harness::new(Connectivity::Offline).await;
    let result = h
        .app
        .update_offline("posts", "42", record(json!({"title": "b"})))
        .await
        .unwrap();
    assert_eq!(result.record(), Some(&record(json!({"id": "42", "title": "b"}))));
    assert_eq!(h.app.sync_status().pending_count, 1);
}

#[tokio::test]
async fn offline_delete_echoes_id() {
    let h = Harness::new(Connectivity::Offline).await;
    let result = h.app.delete_offline("posts", "42").await.unwrap();
    match result {
        MutationResult::Provisional { action_id, record: row } => {
            assert_eq!(row, record(json!({"id": "42"})));
            let pending = h.coordinator.pending_actions().await;
            assert_eq!(pending[0].id, action_id);
        }
        other => panic!("expected provisional, got {other:?}"),
    }
}

#[tokio::test]
async fn custom_temp_prefix() {
    let config = SyncConfig {
        temp_id_prefix: "local:".into(),
        ..Default::default()
    };
    let h = Harness::with_config(Connectivity::Offline, config).await;
    let result = h.app.create_offline("journal", record(json!({"mood": 3}))).await.unwrap();
    assert!(result.record().unwrap()["id"].as_str().unwrap().starts_with("local:"));
}

#[tokio::test]
async fn offline_storage_failure_propagates() {
    let h = Harness::new(Connectivity::Offline).await;
    h.storage.fail_writes(true);

    let err = h.app.delete_offline("posts", "1").await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
    assert_eq!(h.app.sync_status().pending_count, 0);
    assert!(h.coordinator.pending_actions().await.is_empty());
}

#[tokio::test]
async fn observers_see_pending_count_change() {
    let h = Harness::new(Connectivity::Offline).await;
    let mut rx = h.app.observe_sync_status();
    h.app.delete_offline("posts", "1").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().pending_count, 1);
}
