mod helpers;

use std::sync::Arc;

use helpers::{test_embedding, test_store, FailingEmbeddingProvider};
use mnemo::config::RetentionConfig;
use mnemo::db;
use mnemo::error::MemoryError;
use mnemo::memory::types::{NewMemory, OwnerType};
use mnemo::memory::{MemoryEngine, MemoryStore};
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");

    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();

    assert!(db_path.exists());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM long_term_memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let conn = db::open_memory_database().unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.memory_count, 0);
    assert_eq!(report.event_count, 0);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("memory.db");

    let id = {
        let store = MemoryStore::open(&db_path).unwrap();
        let memory = NewMemory::new("henry", OwnerType::User, "likes tea").tags(["preference"]);
        store.insert(&memory, &test_embedding(3)).unwrap()
    };

    let store = MemoryStore::open(&db_path).unwrap();
    let entry = store.get(id).unwrap();
    assert_eq!(entry.content, "likes tea");
    assert_eq!(entry.embedding, test_embedding(3));
    assert!(entry.has_tag("preference"));
}

#[test]
fn embedding_failure_leaves_store_untouched() {
    let store = test_store();
    let engine = MemoryEngine::new(
        Arc::clone(&store),
        Arc::new(FailingEmbeddingProvider),
        RetentionConfig::default(),
    );

    let err = engine
        .add_memory(NewMemory::new("henry", OwnerType::User, "likes tea"))
        .unwrap_err();
    assert!(err.is_retryable(), "embedding failures should be retryable");

    let count: i64 = store.with_connection(|conn| {
        conn.query_row("SELECT COUNT(*) FROM long_term_memories", [], |row| row.get(0))
            .unwrap()
    });
    assert_eq!(count, 0, "a failed embed must not write a row");

    let err = engine
        .search_text("henry", OwnerType::User, "tea", 5)
        .unwrap_err();
    assert!(matches!(err, MemoryError::Embedding(_)));
}

#[test]
fn corrupt_tags_surface_as_serialization_error() {
    let store = test_store();
    let memory = NewMemory::new("henry", OwnerType::User, "likes tea");
    let id = store.insert(&memory, &test_embedding(0)).unwrap();
    store.with_connection(|conn| {
        conn.execute(
            "UPDATE long_term_memories SET tags = 'not json' WHERE id = ?1",
            [id],
        )
        .unwrap();
    });

    let err = store.get(id).unwrap_err();
    assert!(matches!(err, MemoryError::Serialization(_)), "got {err:?}");
    assert!(!err.is_retryable());
}

#[test]
fn missing_id_is_not_found_only_on_get() {
    let store = test_store();
    assert!(matches!(store.get(42), Err(MemoryError::NotFound(42))));
    // update and delete paths treat a missing id as a no-op
    assert!(!store.update_importance(42, 0.5).unwrap());
    assert_eq!(store.delete_many(&[42]).unwrap(), 0);
    store.update_last_used(&[42]).unwrap();
}
