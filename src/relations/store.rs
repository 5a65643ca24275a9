//! Relation persistence: one SQLite row per relation plus an audit log.
//!
//! [`RelationStore`] keeps every row in memory as well. Lookups never touch
//! SQLite; [`RelationStore::persist`] writes the row and its audit entry in
//! one transaction and only then updates the cache, so a failed write leaves
//! both views unchanged.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result, StorageError};
use crate::relations::types::{Relation, RelationType};

/// Operation recorded in `relation_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOperation {
    Declare,
    Update,
    Delete,
    Spawn,
}

impl LogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declare => "declare",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Spawn => "spawn",
        }
    }
}

/// One row of `relation_log`.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub operation: String,
    pub relation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub created_at: String,
}

pub struct RelationStore {
    conn: Mutex<Connection>,
    by_id: HashMap<String, Relation>,
    by_key: HashMap<(RelationType, String), String>,
}

impl RelationStore {
    /// Wrap an initialized connection and load every stored relation.
    pub fn open(conn: Connection) -> Result<Self> {
        let relations = load_all(&conn)?;
        let mut store = Self {
            conn: Mutex::new(conn),
            by_id: HashMap::with_capacity(relations.len()),
            by_key: HashMap::with_capacity(relations.len()),
        };
        for relation in relations {
            store.cache(relation);
        }
        tracing::debug!(relations = store.by_id.len(), "relation store loaded");
        Ok(store)
    }

    fn cache(&mut self, relation: Relation) {
        self.by_key.insert(
            (relation.relation_type, relation.key().to_string()),
            relation.id.clone(),
        );
        self.by_id.insert(relation.id.clone(), relation);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned("relation store connection".into()).into())
    }

    /// Lookup by id. Soft-deleted relations are still returned.
    pub fn load_by_id(&self, id: &str) -> Option<&Relation> {
        self.by_id.get(id)
    }

    pub fn load_by_key(&self, relation_type: RelationType, key: &str) -> Option<&Relation> {
        self.by_key
            .get(&(relation_type, key.to_string()))
            .and_then(|id| self.by_id.get(id))
    }

    /// Relations of one type in creation order.
    pub fn load_by_type(&self, relation_type: RelationType, include_deleted: bool) -> Vec<&Relation> {
        let mut found: Vec<&Relation> = self
            .by_id
            .values()
            .filter(|r| r.relation_type == relation_type)
            .filter(|r| include_deleted || !r.is_deleted())
            .collect();
        sort_by_creation(&mut found);
        found
    }

    /// Relations whose property `key` equals `value`, or contains it when the
    /// property is a list.
    pub fn load_by_property(&self, key: &str, value: &Value, include_deleted: bool) -> Vec<&Relation> {
        let mut found: Vec<&Relation> = self
            .by_id
            .values()
            .filter(|r| include_deleted || !r.is_deleted())
            .filter(|r| {
                r.properties
                    .get(key)
                    .is_some_and(|actual| property_matches(actual, value))
            })
            .collect();
        sort_by_creation(&mut found);
        found
    }

    /// Every relation, deleted ones included, in the order they were created.
    pub fn all(&self) -> Vec<&Relation> {
        let mut found: Vec<&Relation> = self.by_id.values().collect();
        sort_by_creation(&mut found);
        found
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Upsert `relation` and append an audit entry, atomically.
    pub fn persist(
        &mut self,
        relation: Relation,
        operation: LogOperation,
        details: Option<&Value>,
    ) -> Result<()> {
        {
            let conn = self
                .conn
                .get_mut()
                .map_err(|_| StorageError::LockPoisoned("relation store connection".into()))?;
            let tx = conn.transaction()?;
            upsert_relation(&tx, &relation)?;
            write_audit_log(&tx, operation, &relation.id, details)?;
            tx.commit()?;
        }

        tracing::debug!(
            relation_id = %relation.id,
            operation = operation.as_str(),
            "relation persisted"
        );
        self.cache(relation);
        Ok(())
    }

    /// Audit trail for one relation, oldest first.
    pub fn history(&self, relation_id: &str) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, operation, relation_id, details, created_at FROM relation_log
             WHERE relation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![relation_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, operation, relation_id, details, created_at)| -> Result<LogEntry> {
                let details = details.map(|d| serde_json::from_str(&d)).transpose()?;
                Ok(LogEntry {
                    id,
                    operation,
                    relation_id,
                    details,
                    created_at,
                })
            })
            .collect()
    }

    /// Run a read-only query against the underlying connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.lock()?;
        Ok(f(&*conn)?)
    }
}

fn sort_by_creation(relations: &mut [&Relation]) {
    relations.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn property_matches(actual: &Value, expected: &Value) -> bool {
    actual == expected || matches!(actual, Value::Array(items) if items.contains(expected))
}

fn load_all(conn: &Connection) -> Result<Vec<Relation>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, properties, content_id, created_at, updated_at
         FROM relations ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, ty, properties, content_id, created_at, updated_at)| -> Result<Relation> {
            let relation_type: RelationType = ty.parse().map_err(Error::Validation)?;
            let properties = serde_json::from_str(&properties)?;
            Ok(Relation {
                id,
                relation_type,
                properties,
                content_id,
                created_at,
                updated_at,
            })
        })
        .collect()
}

fn upsert_relation(tx: &Transaction, relation: &Relation) -> Result<()> {
    let properties = serde_json::to_string(&relation.properties)?;
    tx.execute(
        "INSERT INTO relations (id, type, key, properties, content_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             properties = excluded.properties,
             content_id = excluded.content_id,
             updated_at = excluded.updated_at",
        params![
            relation.id,
            relation.relation_type.as_str(),
            relation.key(),
            properties,
            relation.content_id,
            relation.created_at,
            relation.updated_at,
        ],
    )?;
    Ok(())
}

/// Write an entry to the relation_log audit table.
fn write_audit_log(
    tx: &Transaction,
    operation: LogOperation,
    relation_id: &str,
    details: Option<&Value>,
) -> Result<()> {
    let now = crate::relations::types::now_timestamp();
    let details_json = details.map(serde_json::to_string).transpose()?;
    tx.execute(
        "INSERT INTO relation_log (operation, relation_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation.as_str(), relation_id, details_json, now],
    )?;
    Ok(())
}
