mod helpers;

use helpers::{bare_config, declare_tool};
use relfs::db;
use relfs::engine::{DeclareRequest, Engine};
use relfs::relations::RelationType;
use relfs::vfs::ReadView;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let conn = db::open_memory_database().unwrap();
    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.relation_count, 0);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(report.log_count, 0);
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
fn relations_and_content_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let id = {
        let engine = Engine::open(bare_config(&tmp)).unwrap();
        declare_tool(&engine, json!({"name": "other", "transforms": ["misc"]}));
        engine
            .declare(
                DeclareRequest::new(
                    RelationType::Tool,
                    helpers::props(json!({"name": "hello", "transforms": ["greet"]})),
                )
                .with_content("#!/bin/sh\necho hello\n"),
            )
            .unwrap()
            .relation
            .id
    };

    let engine = Engine::open(bare_config(&tmp)).unwrap();
    let read = engine.read("/commands/hello", ReadView::Content).unwrap().unwrap();
    assert_eq!(read.relation.id, id);
    assert_eq!(read.text(), Some("#!/bin/sh\necho hello\n"));

    let hits = engine.search(&["hello"], relfs::search::QueryMode::Or, None).unwrap();
    assert_eq!(hits[0].id, id);
}

#[test]
fn missing_content_object_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(bare_config(&tmp)).unwrap();
    let outcome = engine
        .declare(
            DeclareRequest::new(RelationType::Tool, helpers::props(json!({"name": "hello"})))
                .with_content("echo hi\n"),
        )
        .unwrap();

    // Wipe the object store behind the engine's back.
    std::fs::remove_dir_all(tmp.path().join("objects")).unwrap();

    let err = engine.read("/commands/hello", ReadView::Content).unwrap_err();
    assert!(matches!(err, relfs::Error::NotFound(_)), "unexpected error: {err}");

    // The properties are still readable.
    let info = engine.read("/commands/hello", ReadView::Info).unwrap().unwrap();
    assert_eq!(info.relation.id, outcome.relation.id);
}

#[test]
fn declare_with_unwritable_content_store_fails_cleanly() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(bare_config(&tmp)).unwrap();

    // Replace the object directory with a plain file so writes fail.
    let objects = tmp.path().join("objects");
    std::fs::remove_dir_all(&objects).unwrap();
    std::fs::write(&objects, b"not a directory").unwrap();

    let err = engine
        .declare(
            DeclareRequest::new(RelationType::Tool, helpers::props(json!({"name": "broken"})))
                .with_content("echo\n"),
        )
        .unwrap_err();
    assert!(matches!(err, relfs::Error::Storage(_)), "unexpected error: {err}");
    assert!(engine
        .get(&relfs::relations::relation_id(RelationType::Tool, "broken"))
        .unwrap()
        .is_none());
    assert!(engine.load_by_type(RelationType::Tool, true).unwrap().is_empty());
    assert!(engine.path_snapshot().unwrap().is_empty());
}
