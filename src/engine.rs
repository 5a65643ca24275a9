//! The relation engine: one coarse lock around the relation store and the two
//! derived indexes, plus the declare pipeline that keeps them in step.
//!
//! A declare runs, under the write lock: validation, content write, relation
//! write, path registration (including dependents), rule evaluation and the
//! search index update. Spawn requests produced by rules are queued and
//! drained one by one after the lock is released, each as its own declare.
//! Spawned relations carry `auto_spawned`, which rules never react to, so the
//! queue always empties.

use std::collections::{HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::RelfsConfig;
use crate::content::ContentStore;
use crate::db;
use crate::error::{Error, Result, StorageError};
use crate::paths::{dependents, generate_paths, PathIndex};
use crate::relations::stats::{relation_stats, StatsResponse};
use crate::relations::types::{now_timestamp, validate_properties, RESERVED_PROPERTIES};
use crate::relations::{
    relation_id, DeclareMode, LogEntry, LogOperation, Properties, Relation, RelationStore,
    RelationType,
};
use crate::rules::{RuleEngine, SpawnRequest};
use crate::search::{relation_document, QueryMode, ScoredResult, SearchIndex};
use crate::vfs::{Entry, Projector, ReadResult, ReadView};

/// Input to [`Engine::declare`].
#[derive(Debug, Clone)]
pub struct DeclareRequest {
    pub relation_type: RelationType,
    pub properties: Properties,
    pub content: Option<Vec<u8>>,
    pub mode: DeclareMode,
}

impl DeclareRequest {
    pub fn new(relation_type: RelationType, properties: Properties) -> Self {
        Self {
            relation_type,
            properties,
            content: None,
            mode: DeclareMode::Merge,
        }
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_mode(mut self, mode: DeclareMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclareOutcome {
    pub relation: Relation,
    /// `false` when the declare updated an existing relation.
    pub created: bool,
    /// Relations created by rules as a consequence, in creation order.
    pub spawned: Vec<Relation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub relations: usize,
    pub path_bindings: usize,
    pub search_documents: usize,
}

struct State {
    relations: RelationStore,
    paths: PathIndex,
    search: SearchIndex,
}

pub struct Engine {
    state: RwLock<State>,
    content: ContentStore,
    rules: RuleEngine,
    config: RelfsConfig,
}

impl Engine {
    /// Open the stores under the configured data directory and rebuild the
    /// indexes from the persisted relations.
    pub fn open(config: RelfsConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let db_path = config.db_path();
        let conn = db::open_database(&db_path)?;
        let relations = RelationStore::open(conn)
            .with_context(|| format!("failed to load relations from {}", db_path.display()))?;
        let content = ContentStore::open(config.objects_dir())?;
        let rules = RuleEngine::from_config(&config.rules, config.rules_file().as_deref())?;
        tracing::info!(
            data_dir = %config.resolved_data_dir().display(),
            rules = rules.rules().len(),
            "engine stores opened"
        );
        Ok(Self::new(relations, content, rules, config)?)
    }

    /// Assemble an engine from already-open parts. The indexes are built
    /// from `relations` before this returns.
    pub fn new(
        relations: RelationStore,
        content: ContentStore,
        rules: RuleEngine,
        config: RelfsConfig,
    ) -> Result<Self> {
        let engine = Self {
            state: RwLock::new(State {
                relations,
                paths: PathIndex::new(),
                search: SearchIndex::new()?,
            }),
            content,
            rules,
            config,
        };
        engine.rebuild_index()?;
        Ok(engine)
    }

    pub fn config(&self) -> &RelfsConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StorageError::LockPoisoned("engine state".into()).into())
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StorageError::LockPoisoned("engine state".into()).into())
    }

    /// Create or update a relation, then run whatever rules it triggers.
    ///
    /// Validation and storage failures abort the declare before anything is
    /// persisted. Failures of spawned declares are logged and skipped.
    pub fn declare(&self, request: DeclareRequest) -> Result<DeclareOutcome> {
        let (relation, created, requests) = {
            let mut guard = self.write_state()?;
            self.declare_locked(&mut guard, request, None)?
        };

        tracing::info!(
            relation_id = %relation.id,
            relation_type = %relation.relation_type,
            created,
            "relation declared"
        );

        let spawned = self.drain(requests);
        Ok(DeclareOutcome {
            relation,
            created,
            spawned,
        })
    }

    fn declare_locked(
        &self,
        state: &mut State,
        request: DeclareRequest,
        spawn: Option<&SpawnRequest>,
    ) -> Result<(Relation, bool, Vec<SpawnRequest>)> {
        let DeclareRequest {
            relation_type,
            mut properties,
            content,
            mode,
        } = request;
        let key = validate_properties(relation_type, &mut properties)?;

        let content_id = match &content {
            Some(bytes) => Some(self.content.put(bytes)?),
            None => None,
        };

        let now = now_timestamp();
        let existing = state.relations.load_by_key(relation_type, &key).cloned();
        let created = existing.is_none();
        let relation = match existing {
            Some(old) => {
                let properties = match mode {
                    DeclareMode::Merge => {
                        let mut merged = old.properties;
                        for reserved in RESERVED_PROPERTIES {
                            merged.remove(reserved);
                        }
                        merged.extend(properties);
                        merged
                    }
                    DeclareMode::Replace => properties,
                };
                Relation {
                    id: old.id,
                    relation_type,
                    properties,
                    content_id: content_id.or(old.content_id),
                    created_at: old.created_at,
                    updated_at: now,
                }
            }
            None => Relation {
                id: relation_id(relation_type, &key),
                relation_type,
                properties,
                content_id,
                created_at: now.clone(),
                updated_at: now,
            },
        };

        let (operation, details) = match spawn {
            Some(req) if created => (
                LogOperation::Spawn,
                json!({ "rule": req.rule_id, "trigger": req.trigger_id }),
            ),
            _ if created => (LogOperation::Declare, json!({ "mode": mode.as_str() })),
            _ => (LogOperation::Update, json!({ "mode": mode.as_str() })),
        };
        state
            .relations
            .persist(relation.clone(), operation, Some(&details))?;

        register_paths(state, &relation.id);
        let requests = self.rules.evaluate(&relation, &state.relations);
        self.index_relation(&mut state.search, &relation, content.as_deref())?;

        Ok((relation, created, requests))
    }

    /// Declare queued spawn requests first-in first-out until none remain.
    fn drain(&self, requests: Vec<SpawnRequest>) -> Vec<Relation> {
        let mut queue: VecDeque<SpawnRequest> = requests.into();
        let mut spawned = Vec::new();

        while let Some(request) = queue.pop_front() {
            match self.spawn(&request) {
                Ok(Some((relation, more))) => {
                    tracing::info!(
                        relation_id = %relation.id,
                        rule = %request.rule_id,
                        trigger = %request.trigger_id,
                        "relation spawned"
                    );
                    queue.extend(more);
                    spawned.push(relation);
                }
                Ok(None) => {
                    tracing::debug!(rule = %request.rule_id, "spawn target appeared meanwhile");
                }
                Err(source) => {
                    let error = Error::RuleExecution {
                        rule_id: request.rule_id.clone(),
                        relation_id: request.trigger_id.clone(),
                        source: Box::new(source),
                    };
                    tracing::warn!(error = %error, "rule action failed");
                }
            }
        }
        spawned
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<Option<(Relation, Vec<SpawnRequest>)>> {
        let mut guard = self.write_state()?;
        let key = request
            .properties
            .get(request.relation_type.key_property())
            .and_then(Value::as_str);
        if let Some(key) = key {
            if guard.relations.load_by_key(request.relation_type, key).is_some() {
                return Ok(None);
            }
        }

        let declare = DeclareRequest::new(request.relation_type, request.properties.clone());
        let (relation, _, more) = self.declare_locked(&mut guard, declare, Some(request))?;
        Ok(Some((relation, more)))
    }

    fn index_relation(
        &self,
        search: &mut SearchIndex,
        relation: &Relation,
        content: Option<&[u8]>,
    ) -> Result<()> {
        if relation.is_deleted() {
            search.remove(&relation.id)?;
            return Ok(());
        }

        let stored;
        let content = match (content, relation.content_id.as_deref()) {
            (Some(bytes), _) => Some(bytes),
            (None, Some(cid)) => {
                stored = match self.content.get(cid) {
                    Ok(Some(bytes)) => Some(bytes),
                    Ok(None) => {
                        tracing::warn!(relation_id = %relation.id, content_id = cid, "dangling content reference");
                        None
                    }
                    Err(e) => {
                        tracing::warn!(relation_id = %relation.id, error = %e, "content unreadable for indexing");
                        None
                    }
                };
                stored.as_deref()
            }
            (None, None) => None,
        };

        search.index_document(relation_document(
            relation,
            content,
            self.config.search.max_indexed_content_bytes,
        ))?;
        Ok(())
    }

    /// Soft delete: the relation keeps resolving by id but leaves every path
    /// and the search index. Deleting twice is a no-op.
    pub fn delete(&self, id: &str) -> Result<Relation> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let Some(mut relation) = state.relations.load_by_id(id).cloned() else {
            return Err(Error::NotFound(id.to_string()));
        };
        if relation.is_deleted() {
            return Ok(relation);
        }

        let now = now_timestamp();
        relation.properties.insert("deleted".into(), Value::Bool(true));
        relation
            .properties
            .insert("deleted_at".into(), Value::String(now.clone()));
        relation.updated_at = now;
        state
            .relations
            .persist(relation.clone(), LogOperation::Delete, None)?;

        register_paths(state, &relation.id);
        state.search.remove(&relation.id)?;
        tracing::info!(relation_id = %relation.id, "relation deleted");
        Ok(relation)
    }

    /// Lookup by id, soft-deleted relations included.
    pub fn get(&self, id: &str) -> Result<Option<Relation>> {
        Ok(self.read_state()?.relations.load_by_id(id).cloned())
    }

    pub fn load_by_type(&self, relation_type: RelationType, include_deleted: bool) -> Result<Vec<Relation>> {
        let state = self.read_state()?;
        Ok(state
            .relations
            .load_by_type(relation_type, include_deleted)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn load_by_property(&self, key: &str, value: &Value, include_deleted: bool) -> Result<Vec<Relation>> {
        let state = self.read_state()?;
        Ok(state
            .relations
            .load_by_property(key, value, include_deleted)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn list(&self, path: &str) -> Result<Option<Vec<Entry>>> {
        let state = self.read_state()?;
        Projector::new(&state.relations, &state.paths, &self.content).list(path)
    }

    pub fn read(&self, path: &str, view: ReadView) -> Result<Option<ReadResult>> {
        let state = self.read_state()?;
        Projector::new(&state.relations, &state.paths, &self.content).read(path, view)
    }

    /// Ranked search. `limit` falls back to `search.default_limit`.
    pub fn search<S: AsRef<str>>(
        &self,
        terms: &[S],
        mode: QueryMode,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredResult>> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        Ok(self.read_state()?.search.query(terms, mode, limit)?)
    }

    /// [`search`](Self::search) minus results under `search.relevance_threshold`.
    pub fn search_relevant<S: AsRef<str>>(
        &self,
        terms: &[S],
        mode: QueryMode,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredResult>> {
        let limit = limit.unwrap_or(self.config.search.default_limit);
        Ok(self.read_state()?.search.query_relevant(
            terms,
            mode,
            limit,
            self.config.search.relevance_threshold,
        )?)
    }

    /// Discard both indexes and replay every stored relation into them.
    pub fn rebuild_index(&self) -> Result<RebuildReport> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        state.paths.clear();
        state.search.clear()?;

        let relations = state.relations.all();
        for relation in &relations {
            if relation.is_deleted() {
                continue;
            }
            state
                .paths
                .replace(&relation.id, generate_paths(relation, &state.relations));
            self.index_relation(&mut state.search, relation, None)?;
        }

        let report = RebuildReport {
            relations: relations.len(),
            path_bindings: state.paths.binding_count(),
            search_documents: state.search.len()?,
        };
        tracing::info!(
            relations = report.relations,
            path_bindings = report.path_bindings,
            search_documents = report.search_documents,
            "indexes rebuilt"
        );
        Ok(report)
    }

    pub fn stats(&self) -> Result<StatsResponse> {
        let state = self.read_state()?;
        let db_path = self.config.db_path();
        let mut stats = state
            .relations
            .with_connection(|conn| relation_stats(conn, Some(&db_path)))?;
        let (objects, bytes) = self.content.usage()?;
        stats.content_objects = objects as u64;
        stats.content_bytes = bytes;
        stats.path_bindings = state.paths.binding_count() as u64;
        stats.search_documents = state.search.len()? as u64;
        Ok(stats)
    }

    /// Audit trail of one relation, oldest first.
    pub fn history(&self, id: &str) -> Result<Vec<LogEntry>> {
        self.read_state()?.relations.history(id)
    }

    /// Every current path binding as `(path, relation ids)`, sorted by path.
    pub fn path_snapshot(&self) -> Result<Vec<(String, Vec<String>)>> {
        Ok(self.read_state()?.paths.snapshot())
    }

    /// Ids of every relation in the search index, sorted.
    pub fn search_document_ids(&self) -> Result<Vec<String>> {
        Ok(self.read_state()?.search.document_ids()?)
    }
}

/// Recompute the paths of `relation_id` and, transitively, of every relation
/// whose paths mention it.
fn register_paths(state: &mut State, relation_id: &str) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut pending = vec![relation_id.to_string()];

    while let Some(id) = pending.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(relation) = state.relations.load_by_id(&id) else {
            continue;
        };
        let paths = generate_paths(relation, &state.relations);
        pending.extend(dependents(relation, &state.relations));
        state.paths.replace(&id, paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::EntryKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn engine_with_rules(rules: RuleEngine) -> (Engine, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = RelfsConfig::with_data_dir(tmp.path());
        let conn = db::open_memory_database().unwrap();
        let relations = RelationStore::open(conn).unwrap();
        let content = ContentStore::open(config.objects_dir()).unwrap();
        (Engine::new(relations, content, rules, config).unwrap(), tmp)
    }

    fn engine() -> (Engine, TempDir) {
        engine_with_rules(RuleEngine::new())
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn tool(engine: &Engine, value: Value) -> DeclareOutcome {
        engine
            .declare(DeclareRequest::new(RelationType::Tool, props(value)))
            .unwrap()
    }

    #[test]
    fn declare_creates_then_updates() {
        let (engine, _tmp) = engine();
        let first = tool(&engine, json!({"name": "foo", "transforms": ["log"]}));
        assert!(first.created);

        let second = tool(&engine, json!({"name": "foo", "description": "reads logs"}));
        assert!(!second.created);
        assert_eq!(second.relation.id, first.relation.id);
        assert_eq!(second.relation.created_at, first.relation.created_at);
        // merge keeps earlier keys
        assert_eq!(second.relation.string_list("transforms"), vec!["log"]);
        assert_eq!(second.relation.str_prop("description"), Some("reads logs"));
    }

    #[test]
    fn replace_mode_drops_old_keys_but_keeps_content() {
        let (engine, _tmp) = engine();
        let first = engine
            .declare(
                DeclareRequest::new(RelationType::Tool, props(json!({"name": "foo", "transforms": ["log"]})))
                    .with_content("#!/bin/sh\n"),
            )
            .unwrap();
        let second = engine
            .declare(
                DeclareRequest::new(RelationType::Tool, props(json!({"name": "foo"})))
                    .with_mode(DeclareMode::Replace),
            )
            .unwrap();
        assert!(second.relation.string_list("transforms").is_empty());
        assert_eq!(second.relation.content_id, first.relation.content_id);
        assert!(engine.read("/tools/by-transform/log/foo", ReadView::Auto).unwrap().is_none());
    }

    #[test]
    fn validation_failure_persists_nothing() {
        let (engine, _tmp) = engine();
        let err = engine
            .declare(DeclareRequest::new(RelationType::Tool, props(json!({"transforms": ["log"]}))))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(crate::error::ValidationError::MissingProperty { ref property, .. })
                if property == "name"
        ));
        assert_eq!(engine.stats().unwrap().total_relations, 0);
        assert!(engine.path_snapshot().unwrap().is_empty());
    }

    #[test]
    fn declare_registers_paths_and_search_document() {
        let (engine, _tmp) = engine();
        let outcome = tool(&engine, json!({"name": "foo", "transforms": ["log", "analyze"]}));
        let id = outcome.relation.id;

        for path in ["/tools/by-name/foo", "/tools/by-transform/log/foo", "/commands/foo"] {
            let read = engine.read(path, ReadView::Info).unwrap().unwrap();
            assert_eq!(read.relation.id, id);
        }
        let hits = engine.search(&["foo"], QueryMode::Or, None).unwrap();
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn delete_hides_but_keeps_resolving_by_id() {
        let (engine, _tmp) = engine();
        let id = tool(&engine, json!({"name": "foo"})).relation.id;

        let deleted = engine.delete(&id).unwrap();
        assert!(deleted.is_deleted());
        assert!(engine.get(&id).unwrap().unwrap().is_deleted());
        assert!(engine.read("/tools/by-name/foo", ReadView::Auto).unwrap().is_none());
        assert!(engine.search(&["foo"], QueryMode::Or, None).unwrap().is_empty());
        assert!(engine.load_by_type(RelationType::Tool, false).unwrap().is_empty());
        assert_eq!(engine.load_by_type(RelationType::Tool, true).unwrap().len(), 1);

        let ops: Vec<String> = engine.history(&id).unwrap().into_iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec!["declare", "delete"]);
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let (engine, _tmp) = engine();
        let err = engine.delete("tool-nope-000000000000").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "unexpected error: {err}");
    }

    #[test]
    fn redeclare_revives_deleted_relation() {
        let (engine, _tmp) = engine();
        let id = tool(&engine, json!({"name": "foo"})).relation.id;
        engine.delete(&id).unwrap();

        let revived = tool(&engine, json!({"name": "foo", "deleted": true}));
        assert!(!revived.created);
        assert!(!revived.relation.is_deleted());
        assert!(revived.relation.properties.get("deleted_at").is_none());
        assert!(engine.read("/tools/by-name/foo", ReadView::Auto).unwrap().is_some());
    }

    #[test]
    fn default_rules_spawn_viewer_once() {
        let mut rules = RuleEngine::new();
        rules.load_str(crate::rules::DEFAULT_RULES).unwrap();
        let (engine, _tmp) = engine_with_rules(rules);

        let outcome = tool(&engine, json!({"name": "foo", "transforms": ["log", "analyze"]}));
        let names: Vec<&str> = outcome.spawned.iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["view-foo"]);
        assert_eq!(outcome.spawned[0].str_prop("spawned_by"), Some(outcome.relation.id.as_str()));

        let again = tool(&engine, json!({"name": "foo", "transforms": ["log", "analyze"]}));
        assert!(again.spawned.is_empty());

        let listing = engine.list("/tools/spawned-by/foo").unwrap().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "view-foo");
        assert_eq!(listing[0].kind, EntryKind::File);

        let spawn_log = engine.history(&outcome.spawned[0].id).unwrap();
        assert_eq!(spawn_log[0].operation, "spawn");
        assert_eq!(spawn_log[0].details.as_ref().unwrap()["rule"], "spawn-viewer");
    }

    #[test]
    fn failing_spawn_does_not_fail_the_trigger() {
        let mut rules = RuleEngine::new();
        rules
            .load_str(
                r#"
[[rule]]
id = "bad-session"
[rule.when]
relation_type = "Tool"
[[rule.spawn]]
relation_type = "MemorySession"
name = "session-for-{name}"
"#,
            )
            .unwrap();
        let (engine, _tmp) = engine_with_rules(rules);

        // MemorySession requires `agent`, so the spawn fails validation.
        let outcome = tool(&engine, json!({"name": "foo"}));
        assert!(outcome.spawned.is_empty());
        assert!(engine.get(&outcome.relation.id).unwrap().is_some());
        assert_eq!(engine.stats().unwrap().total_relations, 1);
    }

    #[test]
    fn late_parent_updates_child_ancestry() {
        let (engine, _tmp) = engine();
        tool(&engine, json!({"name": "child", "parent": "mid"}));
        tool(&engine, json!({"name": "mid", "parent": "root"}));

        let before = engine.path_snapshot().unwrap();
        assert!(before.iter().any(|(p, _)| p == "/tools/ancestry/child/mid/root"));

        tool(&engine, json!({"name": "root", "parent": "origin"}));
        let incremental = engine.path_snapshot().unwrap();
        assert!(incremental
            .iter()
            .any(|(p, _)| p == "/tools/ancestry/child/mid/root/origin"));

        engine.rebuild_index().unwrap();
        assert_eq!(engine.path_snapshot().unwrap(), incremental);
    }

    #[test]
    fn stats_count_indexes_and_content() {
        let (engine, _tmp) = engine();
        engine
            .declare(
                DeclareRequest::new(RelationType::Tool, props(json!({"name": "foo"})))
                    .with_content("echo foo\n"),
            )
            .unwrap();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_relations, 1);
        assert_eq!(stats.content_objects, 1);
        assert_eq!(stats.search_documents, 1);
        assert!(stats.path_bindings >= 3);
    }
}
