//! Path generation rules: which virtual paths a relation appears under.
//!
//! Generation is a pure function of the relation and the rest of the store
//! (for spawner names and parent chains). Soft-deleted relations get no paths.

use std::collections::HashSet;

use crate::relations::{Relation, RelationStore, RelationType};

/// Every path `relation` should be bound to, sorted and deduplicated.
pub fn generate_paths(relation: &Relation, relations: &RelationStore) -> Vec<String> {
    if relation.is_deleted() {
        return Vec::new();
    }

    let mut paths = match relation.relation_type {
        RelationType::Tool => tool_paths(relation, relations),
        RelationType::Artifact => artifact_paths(relation, relations),
        RelationType::UrlArtifact => url_paths(relation),
        RelationType::MemorySession => session_paths(relation),
    };
    paths.sort();
    paths.dedup();
    paths
}

/// Path segment for an arbitrary value: `/` becomes `_`, blank is skipped.
pub fn segment(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.replace('/', "_"))
    }
}

fn join(parts: &[&str]) -> Option<String> {
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(&segment(part)?);
    }
    Some(out)
}

fn tool_paths(tool: &Relation, relations: &RelationStore) -> Vec<String> {
    let name = tool.display_name();
    let date = tool.created_date();
    let mut paths = Vec::new();

    paths.extend(join(&["tools", "by-name", name]));
    for transform in tool.string_list("transforms") {
        paths.extend(join(&["tools", "by-transform", transform, name]));
    }
    if tool.bool_prop("materialized") != Some(false) {
        paths.extend(join(&["commands", name]));
    }
    paths.extend(join(&["by-date", date, name]));
    paths.extend(spawned_by_path(tool, relations));

    let chain = ancestry_chain(tool, relations);
    if !chain.is_empty() {
        let mut parts = vec!["tools", "ancestry", name];
        parts.extend(chain.iter().map(String::as_str));
        paths.extend(join(&parts));
    }

    if let Some(session) = tool.str_prop("memory_session") {
        paths.extend(join(&["memory", session, "generated", name]));
    }
    paths
}

fn artifact_paths(artifact: &Relation, relations: &RelationStore) -> Vec<String> {
    let name = artifact.display_name();
    let kind = artifact
        .str_prop("artifact_type")
        .filter(|k| !k.trim().is_empty())
        .unwrap_or("general");
    let mut paths = Vec::new();

    paths.extend(join(&["artifacts", kind, name]));
    paths.extend(join(&["by-date", artifact.created_date(), name]));
    paths.extend(spawned_by_path(artifact, relations));
    paths
}

fn url_paths(url: &Relation) -> Vec<String> {
    [
        join(&["artifacts", "urls", &url.id]),
        join(&["by-date", url.created_date(), &url.id]),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn session_paths(session: &Relation) -> Vec<String> {
    let id = session.key();
    let mut paths = Vec::new();
    paths.extend(join(&["memory", id]));
    paths.extend(join(&["by-date", session.created_date(), "memory", id]));
    if let Some(agent) = session.str_prop("agent") {
        paths.extend(join(&["by-agent", agent, "memory", id]));
    }
    paths
}

/// `/tools/spawned-by/<spawner name>/<name>`; the raw id stands in for a
/// spawner that no longer resolves.
fn spawned_by_path(relation: &Relation, relations: &RelationStore) -> Option<String> {
    let spawner_id = relation.str_prop("spawned_by")?;
    let spawner = relations
        .load_by_id(spawner_id)
        .map(Relation::display_name)
        .unwrap_or(spawner_id);
    join(&["tools", "spawned-by", spawner, relation.display_name()])
}

/// Parent names from nearest to furthest, following `parent` by tool name.
/// A parent that is not stored still appears but ends the walk, as does a
/// name seen before.
pub fn ancestry_chain(tool: &Relation, relations: &RelationStore) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([tool.display_name().to_string()]);
    let mut next = tool.str_prop("parent").map(str::to_string);

    while let Some(parent) = next.take() {
        if parent.trim().is_empty() || !seen.insert(parent.clone()) {
            break;
        }
        next = relations
            .load_by_key(RelationType::Tool, &parent)
            .and_then(|p| p.str_prop("parent"))
            .map(str::to_string);
        chain.push(parent);
    }
    chain
}

/// Ids of relations whose paths mention `relation`: anything it spawned and,
/// for a tool, anything naming it as `parent`.
pub fn dependents(relation: &Relation, relations: &RelationStore) -> Vec<String> {
    let mut ids: Vec<String> = relations
        .load_by_property("spawned_by", &relation.id.clone().into(), true)
        .into_iter()
        .map(|r| r.id.clone())
        .collect();
    if relation.relation_type == RelationType::Tool {
        ids.extend(
            relations
                .load_by_property("parent", &relation.display_name().into(), true)
                .into_iter()
                .filter(|r| r.relation_type == RelationType::Tool)
                .map(|r| r.id.clone()),
        );
    }
    ids.retain(|id| id != &relation.id);
    ids.sort();
    ids.dedup();
    ids
}
