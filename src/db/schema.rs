//! SQL DDL for all relfs tables.
//!
//! Defines the `relations`, `relation_log` and `schema_meta` tables, plus the
//! FTS5 tables of the search index. The search tables live in a separate
//! in-memory database that is refilled from `relations` on every start. All
//! DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for relfs's core tables.
const SCHEMA_SQL: &str = r#"
-- One row per entity, keyed by its deterministic id
CREATE TABLE IF NOT EXISTS relations (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK(type IN ('Tool','Artifact','URLArtifact','MemorySession')),
    key TEXT NOT NULL,
    properties TEXT NOT NULL,
    content_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(type, key)
);

CREATE INDEX IF NOT EXISTS idx_relations_type ON relations(type);

-- Audit log
CREATE TABLE IF NOT EXISTS relation_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('declare','update','delete','spawn')),
    relation_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Search index DDL: document metadata keyed by `seq`, which is also the
/// rowid of the matching `search_fts` row.
const SEARCH_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS search_docs (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Full-text index over title and body (column 0 and 1)
CREATE VIRTUAL TABLE IF NOT EXISTS search_fts USING fts5(
    title,
    body,
    tokenize = 'unicode61 remove_diacritics 0'
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

/// Initialize the search index tables. Idempotent.
pub fn init_search_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SEARCH_SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"relations".to_string()));
        assert!(tables.contains(&"relation_log".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn type_and_key_are_unique() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let insert = "INSERT INTO relations (id, type, key, properties, created_at, updated_at)
                      VALUES (?1, 'Tool', 'ls', '{}', 't', 't')";
        conn.execute(insert, ["tool-ls-1"]).unwrap();
        assert!(conn.execute(insert, ["tool-ls-2"]).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO relations (id, type, key, properties, created_at, updated_at)
             VALUES ('x', 'Widget', 'x', '{}', 't', 't')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn search_schema_creates_fts_table() {
        let conn = Connection::open_in_memory().unwrap();
        init_search_schema(&conn).unwrap();
        init_search_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO search_fts (rowid, title, body) VALUES (1, 'git-haiku', 'poems')",
            [],
        )
        .unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM search_fts WHERE search_fts MATCH '\"poems\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}
