use compass_storage::kv::mock::FlakyStore;
use compass_storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};
use tempfile::TempDir;

// ── MemoryStore ──────────────────────────────────────────────────

#[tokio::test]
async fn memory_get_missing_is_none() {
    let store = MemoryStore::new();
    assert!(store.get("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn memory_set_get_remove() {
    let store = MemoryStore::new();
    store.set("k", b"v1").await.unwrap();
    store.set("k", b"v2").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));

    store.remove("k").await.unwrap();
    store.remove("k").await.unwrap(); // missing key is fine
    assert!(store.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn memory_clones_share_contents() {
    let store = MemoryStore::new();
    let clone = store.clone();
    store.set("k", b"shared").await.unwrap();
    assert_eq!(clone.raw("k"), Some(b"shared".to_vec()));
}

// ── FlakyStore ───────────────────────────────────────────────────

#[tokio::test]
async fn flaky_store_fails_writes_on_demand() {
    let store = FlakyStore::new(MemoryStore::new());
    store.set("k", b"ok").await.unwrap();

    store.fail_writes(true);
    let err = store.set("k", b"lost").await.unwrap_err();
    assert!(matches!(err, StorageError::WriteFailed(_)));
    assert!(store.remove("k").await.is_err());

    // Reads still work and see the last good value.
    assert_eq!(store.get("k").await.unwrap(), Some(b"ok".to_vec()));
    assert_eq!(store.write_count(), 1);

    store.fail_writes(false);
    store.set("k", b"again").await.unwrap();
    assert_eq!(store.inner().raw("k"), Some(b"again".to_vec()));
}

// ── SqliteStore ──────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_in_memory_set_get_remove() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.get("k").await.unwrap().is_none());

    store.set("k", b"one").await.unwrap();
    store.set("k", b"two").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(b"two".to_vec()));

    store.remove("k").await.unwrap();
    store.remove("k").await.unwrap();
    assert!(store.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.set("pending", b"[1,2,3]").await.unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.get("pending").await.unwrap(), Some(b"[1,2,3]".to_vec()));
}

#[tokio::test]
async fn sqlite_keys_are_independent() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("a", b"1").await.unwrap();
    store.set("b", b"2").await.unwrap();
    store.remove("a").await.unwrap();
    assert!(store.get("a").await.unwrap().is_none());
    assert_eq!(store.get("b").await.unwrap(), Some(b"2".to_vec()));
}

#[tokio::test]
async fn sqlite_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("app").join("queue.db");

    let store = SqliteStore::open(&path).unwrap();
    store.set("k", b"v").await.unwrap();
    assert!(path.exists());
}
