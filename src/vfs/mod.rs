//! Virtual filesystem projection over the relation and path indexes.
//!
//! A [`Projector`] borrows the stores for the duration of one read-locked
//! call. Most directories are read straight out of the [`PathIndex`]; a few
//! levels are synthesized: the fixed top-level layout, the per-tool
//! directories under `/tools/<name>/`, and the orderings that differ from the
//! index's alphabetical order (`/by-date/` newest first, sessions active
//! first).

use std::cmp::Ordering;

use serde::Serialize;

use crate::content::ContentStore;
use crate::error::{Error, Result};
use crate::paths::{ancestry_chain, normalize, segment, PathBinding, PathIndex};
use crate::relations::{Relation, RelationStore, RelationType};

const ROOT_DIRS: [&str; 6] = ["artifacts", "by-agent", "by-date", "commands", "memory", "tools"];
const TOOL_VIEWS: [&str; 4] = ["ancestry", "by-name", "by-transform", "spawned-by"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<RelationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Entry {
    fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Directory,
            relation_id: None,
            relation_type: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn file(name: &str) -> Self {
        Self {
            kind: EntryKind::File,
            ..Self::dir(name)
        }
    }

    fn with_relation(mut self, relation: &Relation) -> Self {
        self.relation_id = Some(relation.id.clone());
        self.relation_type = Some(relation.relation_type);
        self.created_at = Some(relation.created_at.clone());
        self.updated_at = Some(relation.updated_at.clone());
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// What [`Projector::read`] should return for a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadView {
    /// Content bytes when the relation has content, otherwise info.
    #[default]
    Auto,
    /// The relation record as JSON.
    Info,
    /// The content bytes.
    Content,
}

impl std::str::FromStr for ReadView {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "info" => Ok(Self::Info),
            "content" | "cat" => Ok(Self::Content),
            _ => Err(crate::error::ValidationError::InvalidProperty {
                property: "view".into(),
                reason: format!("expected auto, info or content, got `{s}`"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub path: String,
    pub relation: Relation,
    /// `Info` or `Content`; never `Auto`.
    pub view: ReadView,
    pub bytes: Vec<u8>,
}

impl ReadResult {
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

pub struct Projector<'a> {
    relations: &'a RelationStore,
    paths: &'a PathIndex,
    content: &'a ContentStore,
}

impl<'a> Projector<'a> {
    pub fn new(relations: &'a RelationStore, paths: &'a PathIndex, content: &'a ContentStore) -> Self {
        Self {
            relations,
            paths,
            content,
        }
    }

    /// Entries under `path`. `Ok(None)` when nothing exists there.
    pub fn list(&self, path: &str) -> Result<Option<Vec<Entry>>> {
        let path = normalize(path)?;
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let entries = match parts.as_slice() {
            [] => Some(ROOT_DIRS.iter().map(|d| Entry::dir(d)).collect()),
            ["tools"] => Some(self.list_tools()),
            ["tools", name] if !TOOL_VIEWS.contains(name) => self.list_tool_dir(name),
            ["tools", name, "spawned"] if !TOOL_VIEWS.contains(name) => self
                .tool(name)
                .map(|_| self.list_index(&format!("/tools/spawned-by/{name}")).unwrap_or_default()),
            ["tools", name, "parents"] if !TOOL_VIEWS.contains(name) => {
                self.tool(name).map(|tool| self.list_parents(tool))
            }
            ["tools", name, leaf @ ("definition" | "executable")] if !TOOL_VIEWS.contains(name) => {
                self.tool(name).and_then(|tool| {
                    (*leaf == "definition" || tool.content_id.is_some())
                        .then(|| vec![Entry::file(leaf).with_relation(tool)])
                })
            }
            ["tools", name, "spawned", child] if !TOOL_VIEWS.contains(name) => self
                .tool(name)
                .and_then(|_| self.list_index(&spawned_path(name, child))),
            ["tools", name, "parents", parent] if !TOOL_VIEWS.contains(name) => self
                .parent_of(name, parent)
                .map(|p| vec![Entry::file(parent).with_relation(p)]),
            ["tools", name, _, ..] if !TOOL_VIEWS.contains(name) => None,
            _ => self.list_index(&path).or_else(|| {
                is_static_dir(&parts).then(Vec::new)
            }),
        };

        let Some(mut entries) = entries else {
            tracing::debug!(path = %path, "list: not found");
            return Ok(None);
        };
        self.order(&parts, &mut entries);
        Ok(Some(entries))
    }

    /// Resolve `path` to exactly one relation and return its info or content.
    ///
    /// `Ok(None)` when nothing is bound there; [`Error::IsDirectory`] for a
    /// directory; [`Error::Ambiguous`] when several relations share the path.
    pub fn read(&self, path: &str, view: ReadView) -> Result<Option<ReadResult>> {
        let path = normalize(path)?;
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (relation, view) = match parts.as_slice() {
            ["tools", name, "definition"] if !TOOL_VIEWS.contains(name) => match self.tool(name) {
                Some(tool) => (tool, ReadView::Info),
                None => return Ok(None),
            },
            ["tools", name, "executable"] if !TOOL_VIEWS.contains(name) => match self.tool(name) {
                Some(tool) if tool.content_id.is_some() => (tool, ReadView::Content),
                _ => return Ok(None),
            },
            ["tools", name, "spawned", child] if !TOOL_VIEWS.contains(name) => {
                if self.tool(name).is_none() {
                    return Ok(None);
                }
                let mut result = self.read(&spawned_path(name, child), view)?;
                if let Some(r) = result.as_mut() {
                    r.path = path.clone();
                }
                return Ok(result);
            }
            ["tools", name, "parents", parent] if !TOOL_VIEWS.contains(name) => {
                match self.parent_of(name, parent) {
                    Some(p) => (p, view),
                    None => return Ok(None),
                }
            }
            ["tools", name, rest @ ..] if !TOOL_VIEWS.contains(name) => {
                let is_dir = matches!(rest, [] | ["spawned" | "parents"]);
                if is_dir && self.tool(name).is_some() {
                    return Err(Error::IsDirectory(path.clone()));
                }
                return Ok(None);
            }
            _ => {
                let ids = self.paths.resolve(&path);
                match ids.len() {
                    0 => {
                        if parts.is_empty() || is_static_dir(&parts) || self.paths.has_children(&path) {
                            return Err(Error::IsDirectory(path.clone()));
                        }
                        tracing::debug!(path = %path, "read: not found");
                        return Ok(None);
                    }
                    1 => match self.relations.load_by_id(&ids[0]) {
                        Some(relation) => (relation, view),
                        None => return Ok(None),
                    },
                    count => {
                        return Err(Error::Ambiguous {
                            path: path.clone(),
                            count,
                        })
                    }
                }
            }
        };

        let view = match view {
            ReadView::Auto if relation.content_id.is_some() => ReadView::Content,
            ReadView::Auto => ReadView::Info,
            other => other,
        };
        let bytes = match view {
            ReadView::Content => self.content_bytes(relation)?,
            _ => serde_json::to_vec_pretty(relation)?,
        };

        Ok(Some(ReadResult {
            path,
            relation: relation.clone(),
            view,
            bytes,
        }))
    }

    fn content_bytes(&self, relation: &Relation) -> Result<Vec<u8>> {
        let Some(content_id) = relation.content_id.as_deref() else {
            return Err(Error::NotFound(format!("relation {} has no content", relation.id)));
        };
        match self.content.get(content_id)? {
            Some(bytes) => Ok(bytes),
            None => {
                tracing::warn!(relation_id = %relation.id, content_id, "content object missing");
                Err(Error::NotFound(format!(
                    "content {content_id} of relation {}",
                    relation.id
                )))
            }
        }
    }

    fn tool(&self, name: &str) -> Option<&'a Relation> {
        self.relations
            .load_by_key(RelationType::Tool, name)
            .filter(|t| !t.is_deleted())
    }

    /// The tool named `parent` when it is in the ancestry of tool `name`.
    fn parent_of(&self, name: &str, parent: &str) -> Option<&'a Relation> {
        let tool = self.tool(name)?;
        let ancestor = ancestry_chain(tool, self.relations)
            .into_iter()
            .find(|a| segment(a).as_deref() == Some(parent))?;
        self.tool(&ancestor)
    }

    fn list_tools(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = TOOL_VIEWS.iter().map(|v| Entry::dir(v)).collect();
        let mut tools: Vec<Entry> = self
            .relations
            .load_by_type(RelationType::Tool, false)
            .into_iter()
            .filter_map(|t| {
                let name = segment(t.display_name())?;
                (!TOOL_VIEWS.contains(&name.as_str())).then(|| Entry::dir(&name).with_relation(t))
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        entries.extend(tools);
        entries
    }

    fn list_tool_dir(&self, name: &str) -> Option<Vec<Entry>> {
        let tool = self.tool(name)?;
        let mut entries = vec![Entry::file("definition").with_relation(tool)];
        if tool.content_id.is_some() {
            entries.push(Entry::file("executable").with_relation(tool));
        }
        entries.push(Entry::dir("spawned"));
        entries.push(Entry::dir("parents"));
        Some(entries)
    }

    fn list_parents(&self, tool: &Relation) -> Vec<Entry> {
        ancestry_chain(tool, self.relations)
            .iter()
            .filter_map(|name| {
                let entry = Entry::file(&segment(name)?);
                Some(match self.relations.load_by_key(RelationType::Tool, name) {
                    Some(parent) => entry.with_relation(parent),
                    None => entry,
                })
            })
            .collect()
    }

    fn list_index(&self, path: &str) -> Option<Vec<Entry>> {
        let children = self.paths.resolve_prefix(path);
        if children.is_empty() {
            // a bound leaf lists as itself
            let ids = self.paths.resolve(path);
            if ids.is_empty() {
                return None;
            }
            let name = path.rsplit('/').next().unwrap_or(path);
            return Some(
                ids.iter()
                    .filter_map(|id| self.relations.load_by_id(id))
                    .map(|r| Entry::file(name).with_relation(r))
                    .collect(),
            );
        }
        Some(children.iter().flat_map(|c| self.binding_entries(c)).collect())
    }

    fn binding_entries(&self, binding: &PathBinding) -> Vec<Entry> {
        let bound: Vec<&Relation> = binding
            .relation_ids
            .iter()
            .filter_map(|id| self.relations.load_by_id(id))
            .collect();
        let base = if binding.is_dir {
            Entry::dir(&binding.name)
        } else {
            Entry::file(&binding.name)
        };
        match bound.as_slice() {
            [] => vec![base],
            [only] => vec![base.with_relation(only)],
            many if binding.is_dir => vec![base.clone().with_relation(many[0])],
            many => many.iter().map(|r| base.clone().with_relation(r)).collect(),
        }
    }

    fn order(&self, parts: &[&str], entries: &mut [Entry]) {
        match parts {
            ["by-date"] => entries.sort_by(|a, b| b.name.cmp(&a.name)),
            ["by-date", _] => entries.sort_by(newest_first),
            ["memory"] | ["by-date", _, "memory"] | ["by-agent", _, "memory"] => {
                entries.sort_by(|a, b| self.session_order(a, b))
            }
            _ => {}
        }
    }

    /// Active sessions (by last activity, newest first), then the rest (by
    /// creation, newest first).
    fn session_order(&self, a: &Entry, b: &Entry) -> Ordering {
        let key = |e: &Entry| {
            let session = e
                .relation_id
                .as_deref()
                .and_then(|id| self.relations.load_by_id(id))
                .filter(|r| r.relation_type == RelationType::MemorySession);
            match session {
                Some(s) if is_active(s) => (
                    0,
                    s.str_prop("last_activity")
                        .unwrap_or(s.updated_at.as_str())
                        .to_string(),
                ),
                Some(s) => (1, s.created_at.clone()),
                None => (2, String::new()),
            }
        };
        let (rank_a, time_a) = key(a);
        let (rank_b, time_b) = key(b);
        rank_a
            .cmp(&rank_b)
            .then_with(|| time_b.cmp(&time_a))
            .then_with(|| a.name.cmp(&b.name))
    }
}

/// A session is active unless its `state` says it has finished.
pub fn is_active(session: &Relation) -> bool {
    matches!(session.str_prop("state"), None | Some("active") | Some("idle"))
}

fn newest_first(a: &Entry, b: &Entry) -> Ordering {
    match (&a.created_at, &b.created_at) {
        (Some(x), Some(y)) => y.cmp(x).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}

/// Where `/tools/<name>/spawned/<child>` lives in the path index.
fn spawned_path(name: &str, child: &str) -> String {
    format!("/tools/spawned-by/{name}/{child}")
}

/// Directories that exist even when empty.
fn is_static_dir(parts: &[&str]) -> bool {
    match parts {
        [] => true,
        [root] => ROOT_DIRS.contains(root),
        ["tools", view] => TOOL_VIEWS.contains(view),
        ["artifacts", "urls"] => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::generate_paths;
    use crate::relations::{relation_id, LogOperation, Properties};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        relations: RelationStore,
        paths: PathIndex,
        content: ContentStore,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let content = ContentStore::open(tmp.path().join("objects")).unwrap();
            Self {
                _tmp: tmp,
                relations: RelationStore::open(crate::db::open_memory_database().unwrap()).unwrap(),
                paths: PathIndex::new(),
                content,
            }
        }

        fn add(&mut self, ty: RelationType, props: Value, created: &str, content: Option<&[u8]>) -> String {
            let properties: Properties = props.as_object().cloned().unwrap();
            let key = properties[ty.key_property()].as_str().unwrap().to_string();
            let relation = Relation {
                id: relation_id(ty, &key),
                relation_type: ty,
                properties,
                content_id: content.map(|c| self.content.put(c).unwrap()),
                created_at: created.to_string(),
                updated_at: created.to_string(),
            };
            self.relations
                .persist(relation.clone(), LogOperation::Declare, None)
                .unwrap();
            let paths = generate_paths(&relation, &self.relations);
            self.paths.replace(&relation.id, paths);
            relation.id
        }

        fn projector(&self) -> Projector<'_> {
            Projector::new(&self.relations, &self.paths, &self.content)
        }
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn root_and_tools_layout() {
        let mut fx = Fixture::new();
        fx.add(RelationType::Tool, json!({"name": "zip"}), "2026-01-01T00:00:00.000000Z", None);
        fx.add(RelationType::Tool, json!({"name": "awk"}), "2026-01-02T00:00:00.000000Z", None);
        let vfs = fx.projector();

        let root = vfs.list("/").unwrap().unwrap();
        assert_eq!(names(&root), ROOT_DIRS.to_vec());
        assert!(root.iter().all(Entry::is_dir));

        let tools = vfs.list("/tools/").unwrap().unwrap();
        assert_eq!(
            names(&tools),
            vec!["ancestry", "by-name", "by-transform", "spawned-by", "awk", "zip"]
        );
    }

    #[test]
    fn empty_static_dirs_list_as_empty_and_unknown_paths_are_none() {
        let fx = Fixture::new();
        let vfs = fx.projector();
        assert_eq!(vfs.list("/commands").unwrap(), Some(vec![]));
        assert_eq!(vfs.list("/tools/by-transform").unwrap(), Some(vec![]));
        assert_eq!(vfs.list("/nowhere").unwrap(), None);
        assert_eq!(vfs.list("/tools/ghost").unwrap(), None);
    }

    #[test]
    fn per_tool_directory() {
        let mut fx = Fixture::new();
        let t = "2026-01-01T00:00:00.000000Z";
        let parent = fx.add(RelationType::Tool, json!({"name": "base"}), t, None);
        fx.add(
            RelationType::Tool,
            json!({"name": "child", "parent": "base", "spawned_by": parent}),
            t,
            Some(b"#!/bin/sh\n"),
        );
        let vfs = fx.projector();

        let dir = vfs.list("/tools/child").unwrap().unwrap();
        assert_eq!(names(&dir), vec!["definition", "executable", "spawned", "parents"]);
        let base_dir = vfs.list("/tools/base").unwrap().unwrap();
        assert_eq!(names(&base_dir), vec!["definition", "spawned", "parents"]);

        assert_eq!(names(&vfs.list("/tools/base/spawned").unwrap().unwrap()), vec!["child"]);
        assert_eq!(names(&vfs.list("/tools/child/parents").unwrap().unwrap()), vec!["base"]);

        let exe = vfs.read("/tools/child/executable", ReadView::Auto).unwrap().unwrap();
        assert_eq!(exe.bytes, b"#!/bin/sh\n");
        let def = vfs.read("/tools/child/definition", ReadView::Auto).unwrap().unwrap();
        assert_eq!(def.view, ReadView::Info);
        assert!(def.text().unwrap().contains("\"parent\": \"base\""));
        assert!(vfs.read("/tools/base/executable", ReadView::Auto).unwrap().is_none());
    }

    #[test]
    fn spawned_and_parent_entries_resolve() {
        let mut fx = Fixture::new();
        let t = "2026-01-01T00:00:00.000000Z";
        let base = fx.add(RelationType::Tool, json!({"name": "base"}), t, None);
        let child = fx.add(
            RelationType::Tool,
            json!({"name": "child", "parent": "base", "spawned_by": base}),
            t,
            Some(b"#!/bin/sh\n"),
        );
        let vfs = fx.projector();

        let spawned = vfs.read("/tools/base/spawned/child", ReadView::Auto).unwrap().unwrap();
        assert_eq!(spawned.relation.id, child);
        assert_eq!(spawned.path, "/tools/base/spawned/child");
        assert_eq!(spawned.bytes, b"#!/bin/sh\n");
        let listed = vfs.list("/tools/base/spawned/child").unwrap().unwrap();
        assert_eq!(listed[0].relation_id.as_deref(), Some(child.as_str()));

        let parent = vfs.read("/tools/child/parents/base", ReadView::Auto).unwrap().unwrap();
        assert_eq!(parent.relation.id, base);
        assert_eq!(parent.view, ReadView::Info);
        let listed = vfs.list("/tools/child/parents/base").unwrap().unwrap();
        assert_eq!(names(&listed), vec!["base"]);
        assert_eq!(listed[0].kind, EntryKind::File);

        // base is not its own parent, and child spawned nothing
        assert!(vfs.read("/tools/base/parents/base", ReadView::Auto).unwrap().is_none());
        assert!(vfs.read("/tools/child/spawned/base", ReadView::Auto).unwrap().is_none());
        assert!(vfs.list("/tools/child/parents/nobody").unwrap().is_none());
    }

    #[test]
    fn unknown_tool_subpaths_are_absent() {
        let mut fx = Fixture::new();
        fx.add(RelationType::Tool, json!({"name": "foo"}), "2026-01-01T00:00:00.000000Z", None);
        let vfs = fx.projector();

        assert!(vfs.read("/tools/foo/bogus", ReadView::Auto).unwrap().is_none());
        assert!(vfs.read("/tools/foo/definition/extra", ReadView::Auto).unwrap().is_none());
        assert!(vfs.list("/tools/foo/bogus").unwrap().is_none());
        assert!(matches!(vfs.read("/tools/foo", ReadView::Auto), Err(Error::IsDirectory(_))));
        assert!(matches!(vfs.read("/tools/foo/spawned", ReadView::Auto), Err(Error::IsDirectory(_))));
        assert!(matches!(vfs.read("/tools/foo/parents", ReadView::Auto), Err(Error::IsDirectory(_))));
        assert!(vfs.read("/tools/ghost", ReadView::Auto).unwrap().is_none());
    }

    #[test]
    fn read_auto_picks_content_or_info() {
        let mut fx = Fixture::new();
        let t = "2026-01-01T00:00:00.000000Z";
        fx.add(RelationType::Tool, json!({"name": "with"}), t, Some(b"body"));
        fx.add(RelationType::Tool, json!({"name": "without"}), t, None);
        let vfs = fx.projector();

        let with = vfs.read("/commands/with", ReadView::Auto).unwrap().unwrap();
        assert_eq!(with.view, ReadView::Content);
        assert_eq!(with.bytes, b"body");

        let info = vfs.read("/commands/with", ReadView::Info).unwrap().unwrap();
        let parsed: Value = serde_json::from_slice(&info.bytes).unwrap();
        assert_eq!(parsed["properties"]["name"], "with");

        let without = vfs.read("/commands/without", ReadView::Auto).unwrap().unwrap();
        assert_eq!(without.view, ReadView::Info);
        assert!(matches!(
            vfs.read("/commands/without", ReadView::Content),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn read_errors_for_directories_and_ambiguity() {
        let mut fx = Fixture::new();
        let t = "2026-01-01T00:00:00.000000Z";
        fx.add(RelationType::Tool, json!({"name": "same"}), t, None);
        fx.add(RelationType::Artifact, json!({"name": "same"}), t, None);
        let vfs = fx.projector();

        assert!(matches!(vfs.read("/tools", ReadView::Auto), Err(Error::IsDirectory(_))));
        assert!(matches!(vfs.read("/by-date", ReadView::Auto), Err(Error::IsDirectory(_))));
        assert!(matches!(
            vfs.read("/by-date/2026-01-01/same", ReadView::Auto),
            Err(Error::Ambiguous { count: 2, .. })
        ));
        assert!(vfs.read("/commands/missing", ReadView::Auto).unwrap().is_none());
        assert!(vfs.read("/tools/../x", ReadView::Auto).is_err());
    }

    #[test]
    fn by_date_is_newest_first() {
        let mut fx = Fixture::new();
        fx.add(RelationType::Tool, json!({"name": "a"}), "2026-01-01T08:00:00.000000Z", None);
        fx.add(RelationType::Tool, json!({"name": "b"}), "2026-01-01T09:00:00.000000Z", None);
        fx.add(RelationType::Tool, json!({"name": "c"}), "2026-01-02T09:00:00.000000Z", None);
        let vfs = fx.projector();

        assert_eq!(names(&vfs.list("/by-date").unwrap().unwrap()), vec!["2026-01-02", "2026-01-01"]);
        assert_eq!(names(&vfs.list("/by-date/2026-01-01").unwrap().unwrap()), vec!["b", "a"]);
    }

    #[test]
    fn sessions_list_active_first() {
        let mut fx = Fixture::new();
        fx.add(
            RelationType::MemorySession,
            json!({"session_id": "old-active", "agent": "claude", "state": "active",
                   "last_activity": "2026-01-05T00:00:00.000000Z"}),
            "2026-01-01T00:00:00.000000Z",
            None,
        );
        fx.add(
            RelationType::MemorySession,
            json!({"session_id": "new-done", "agent": "claude", "state": "completed"}),
            "2026-01-04T00:00:00.000000Z",
            None,
        );
        fx.add(
            RelationType::MemorySession,
            json!({"session_id": "older-done", "agent": "claude", "state": "abandoned"}),
            "2026-01-02T00:00:00.000000Z",
            None,
        );
        let vfs = fx.projector();

        let expected = vec!["old-active", "new-done", "older-done"];
        assert_eq!(names(&vfs.list("/memory").unwrap().unwrap()), expected);
        assert_eq!(names(&vfs.list("/by-agent/claude/memory").unwrap().unwrap()), expected);
    }

    #[test]
    fn leaf_lists_as_itself() {
        let mut fx = Fixture::new();
        fx.add(RelationType::Tool, json!({"name": "solo"}), "2026-01-01T00:00:00.000000Z", None);
        let vfs = fx.projector();
        let entries = vfs.list("/commands/solo").unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].relation_type, Some(RelationType::Tool));
    }
}
