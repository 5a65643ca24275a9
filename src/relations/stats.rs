use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::relations::types::RelationType;

/// Response from relation_stats.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_relations: u64,
    pub active_relations: u64,
    pub deleted_relations: u64,
    pub auto_spawned_relations: u64,
    /// Active relations per type.
    pub by_type: BTreeMap<String, u64>,
    pub log_entries: u64,
    pub db_size_bytes: u64,
    pub content_objects: u64,
    pub content_bytes: u64,
    pub path_bindings: u64,
    pub search_documents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_relation: Option<String>,
}

/// Compute the persisted part of the statistics. Index and content counts are
/// left at zero for the caller to fill in.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn relation_stats(conn: &Connection, db_path: Option<&Path>) -> rusqlite::Result<StatsResponse> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;
    let deleted: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relations WHERE json_extract(properties, '$.deleted') = 1",
        [],
        |row| row.get(0),
    )?;
    let auto_spawned: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relations WHERE json_extract(properties, '$.auto_spawned') = 1",
        [],
        |row| row.get(0),
    )?;
    let log_entries: i64 =
        conn.query_row("SELECT COUNT(*) FROM relation_log", [], |row| row.get(0))?;

    let mut by_type: BTreeMap<String, u64> = RelationType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();
    let mut stmt = conn.prepare(
        "SELECT type, COUNT(*) FROM relations
         WHERE COALESCE(json_extract(properties, '$.deleted'), 0) != 1
         GROUP BY type",
    )?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (t, count) in rows {
        by_type.insert(t, count as u64);
    }

    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM relations",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_relations: total as u64,
        active_relations: (total - deleted) as u64,
        deleted_relations: deleted as u64,
        auto_spawned_relations: auto_spawned as u64,
        by_type,
        log_entries: log_entries as u64,
        db_size_bytes,
        content_objects: 0,
        content_bytes: 0,
        path_bindings: 0,
        search_documents: 0,
        oldest_relation: oldest,
        newest_relation: newest,
    })
}
