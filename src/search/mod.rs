//! Keyword index over relation text, backed by SQLite FTS5.
//!
//! The index lives in its own in-memory database and is refilled from the
//! relation store at startup and on rebuild. FTS5 selects the candidates;
//! scoring happens here. Three query modes: OR (score = matching terms), AND
//! (every term required) and PHRASE (contiguous terms). A term found in a
//! document's title earns one extra point. Results sort by score, then most
//! recently updated, then id.

pub mod fts;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::schema::init_search_schema;
use crate::error::{StorageError, ValidationError};
use crate::relations::Relation;

/// Limit applied when a caller passes zero.
pub const DEFAULT_LIMIT: usize = 10;

/// Marker `highlight()` puts before each phrase instance.
const HIT_OPEN: char = '\u{1}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Or,
    And,
    Phrase,
}

impl std::str::FromStr for QueryMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Ok(Self::Or),
            "and" => Ok(Self::And),
            "phrase" => Ok(Self::Phrase),
            _ => Err(ValidationError::InvalidProperty {
                property: "mode".into(),
                reason: format!("expected OR, AND or PHRASE, got `{s}`"),
            }),
        }
    }
}

/// Text to index for one id.
#[derive(Debug, Clone, Default)]
pub struct DocumentInput {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub score: f64,
    pub updated_at: String,
}

type SearchResult<T> = std::result::Result<T, StorageError>;

pub struct SearchIndex {
    conn: Mutex<Connection>,
}

impl SearchIndex {
    /// Open an empty index in a private in-memory database.
    pub fn new() -> SearchResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_search_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> SearchResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned("search index".into()))
    }

    fn conn_mut(&mut self) -> SearchResult<&mut Connection> {
        self.conn
            .get_mut()
            .map_err(|_| StorageError::LockPoisoned("search index".into()))
    }

    /// Index free text under `id` with no title.
    pub fn index(&mut self, id: &str, text: &str, kind: &str) -> SearchResult<()> {
        self.index_document(DocumentInput {
            id: id.to_string(),
            kind: kind.to_string(),
            body: text.to_string(),
            ..Default::default()
        })
    }

    /// Index (or re-index) a document, replacing any previous text for its id.
    pub fn index_document(&mut self, input: DocumentInput) -> SearchResult<()> {
        let tx = self.conn_mut()?.transaction()?;
        delete_document(&tx, &input.id)?;
        tx.execute(
            "INSERT INTO search_docs (id, kind, title, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![input.id, input.kind, input.title, input.updated_at],
        )?;
        let seq = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO search_fts (rowid, title, body) VALUES (?1, ?2, ?3)",
            params![seq, input.title, input.body],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> SearchResult<()> {
        let tx = self.conn_mut()?.transaction()?;
        delete_document(&tx, id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear(&mut self) -> SearchResult<()> {
        self.conn_mut()?
            .execute_batch("DELETE FROM search_fts; DELETE FROM search_docs;")?;
        Ok(())
    }

    pub fn len(&self) -> SearchResult<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM search_docs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> SearchResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Ids of every indexed document, sorted.
    pub fn document_ids(&self) -> SearchResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM search_docs ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Run a query. A `limit` of zero means [`DEFAULT_LIMIT`].
    pub fn query<S: AsRef<str>>(
        &self,
        terms: &[S],
        mode: QueryMode,
        limit: usize,
    ) -> SearchResult<Vec<ScoredResult>> {
        let words = fts::query_words(terms);
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

        let conn = self.lock()?;
        let mut results = match mode {
            QueryMode::Or => score_terms(&conn, &words, &fts::any_of(&words))?,
            QueryMode::And => score_terms(&conn, &words, &fts::all_of(&words))?,
            QueryMode::Phrase => score_phrase(&conn, &words)?,
        };

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        tracing::debug!(terms = words.len(), ?mode, hits = results.len(), "search query");
        Ok(results)
    }

    /// [`query`](Self::query) minus results scoring below `threshold`, for
    /// consumers that act on the top hit without a human in the loop.
    pub fn query_relevant<S: AsRef<str>>(
        &self,
        terms: &[S],
        mode: QueryMode,
        limit: usize,
        threshold: f64,
    ) -> SearchResult<Vec<ScoredResult>> {
        let mut results = self.query(terms, mode, limit)?;
        results.retain(|r| r.score >= threshold);
        Ok(results)
    }
}

fn delete_document(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    let seq: Option<i64> = conn
        .query_row("SELECT seq FROM search_docs WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    if let Some(seq) = seq {
        conn.execute("DELETE FROM search_fts WHERE rowid = ?1", [seq])?;
        conn.execute("DELETE FROM search_docs WHERE seq = ?1", [seq])?;
    }
    Ok(())
}

/// Metadata of every document matching `expr`.
fn matching_docs(conn: &Connection, expr: &str) -> rusqlite::Result<Vec<ScoredResult>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.kind, d.title, d.updated_at FROM search_fts \
         JOIN search_docs d ON d.seq = search_fts.rowid \
         WHERE search_fts MATCH ?1",
    )?;
    let docs = stmt
        .query_map([expr], |row| {
            Ok(ScoredResult {
                id: row.get(0)?,
                kind: row.get(1)?,
                title: row.get(2)?,
                score: 0.0,
                updated_at: row.get(3)?,
            })
        })?
        .collect();
    docs
}

fn matching_ids(conn: &Connection, expr: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT d.id FROM search_fts \
         JOIN search_docs d ON d.seq = search_fts.rowid \
         WHERE search_fts MATCH ?1",
    )?;
    let ids = stmt.query_map([expr], |row| row.get(0))?.collect();
    ids
}

/// One point per distinct word a candidate contains, two if the word is in
/// its title.
fn score_terms(
    conn: &Connection,
    words: &[String],
    candidates: &str,
) -> rusqlite::Result<Vec<ScoredResult>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut scores: HashMap<String, f64> = HashMap::new();
    for word in words {
        if !seen.insert(word.to_lowercase()) {
            continue;
        }
        let term = fts::quote(word);
        let in_title = matching_ids(conn, &fts::in_title(&term))?;
        for id in matching_ids(conn, &term)? {
            let points = if in_title.contains(&id) { 2.0 } else { 1.0 };
            *scores.entry(id).or_insert(0.0) += points;
        }
    }

    Ok(matching_docs(conn, candidates)?
        .into_iter()
        .filter_map(|mut doc| {
            doc.score = scores.get(&doc.id).copied().filter(|s| *s > 0.0)?;
            Some(doc)
        })
        .collect())
}

/// Words times occurrences, plus one when the phrase is in the title.
fn score_phrase(conn: &Connection, words: &[String]) -> rusqlite::Result<Vec<ScoredResult>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.kind, d.title, d.updated_at, \
                highlight(search_fts, 0, char(1), char(2)), \
                highlight(search_fts, 1, char(1), char(2)) \
         FROM search_fts JOIN search_docs d ON d.seq = search_fts.rowid \
         WHERE search_fts MATCH ?1",
    )?;
    let rows = stmt.query_map([fts::phrase(words)], |row| {
        let marked_title: String = row.get(4)?;
        let marked_body: String = row.get(5)?;
        Ok((
            ScoredResult {
                id: row.get(0)?,
                kind: row.get(1)?,
                title: row.get(2)?,
                score: 0.0,
                updated_at: row.get(3)?,
            },
            hits(&marked_title),
            hits(&marked_body),
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (mut doc, in_title, in_body) = row?;
        let occurrences = in_title + in_body;
        if occurrences == 0 {
            continue;
        }
        doc.score = (words.len() * occurrences) as f64;
        if in_title > 0 {
            doc.score += 1.0;
        }
        results.push(doc);
    }
    Ok(results)
}

fn hits(marked: &str) -> usize {
    marked.chars().filter(|c| *c == HIT_OPEN).count()
}

/// Searchable text of a relation: its name as title; type, description,
/// transforms, other string properties and (if textual) its content as body.
pub fn relation_document(relation: &Relation, content: Option<&[u8]>, max_content_bytes: usize) -> DocumentInput {
    let title = relation.display_name().to_string();
    let mut body: Vec<String> = vec![relation.relation_type.as_str().to_string()];

    if let Some(description) = relation.str_prop("description") {
        body.push(description.to_string());
    }
    body.extend(relation.string_list("transforms").into_iter().map(str::to_string));

    let mut keys: Vec<&String> = relation.properties.keys().collect();
    keys.sort();
    for key in keys {
        if matches!(key.as_str(), "name" | "description" | "transforms" | "spawned_by") {
            continue;
        }
        body.extend(relation.string_list(key).into_iter().map(str::to_string));
    }

    if let Some(text) = content.and_then(|bytes| indexable_text(bytes, max_content_bytes)) {
        body.push(text.to_string());
    }

    DocumentInput {
        id: relation.id.clone(),
        kind: relation.relation_type.as_str().to_string(),
        title,
        body: body.join("\n"),
        updated_at: relation.updated_at.clone(),
    }
}

/// UTF-8 prefix of `bytes` up to `max` bytes, or `None` for binary content.
fn indexable_text(bytes: &[u8], max: usize) -> Option<&str> {
    let slice = &bytes[..bytes.len().min(max)];
    match std::str::from_utf8(slice) {
        Ok(text) => Some(text),
        // cut in the middle of a character by the size cap
        Err(e) if slice.len() < bytes.len() && e.error_len().is_none() => {
            std::str::from_utf8(&slice[..e.valid_up_to()]).ok()
        }
        Err(_) => None,
    }
}
