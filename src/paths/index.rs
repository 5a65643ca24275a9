//! In-memory path index: virtual path -> relation ids.
//!
//! Bindings live in a `BTreeMap` so a prefix scan walks one contiguous range.
//! The reverse map lets a re-declare drop a relation's old paths before its new
//! ones are registered.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::error::ValidationError;

/// One immediate child under a prefix, as returned by [`PathIndex::resolve_prefix`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathBinding {
    /// Full path of the child.
    pub path: String,
    /// Last segment of `path`.
    pub name: String,
    /// Relations bound exactly at `path`.
    pub relation_ids: Vec<String>,
    /// `true` when deeper bindings exist below `path`.
    pub is_dir: bool,
}

#[derive(Debug, Default)]
pub struct PathIndex {
    bindings: BTreeMap<String, BTreeSet<String>>,
    by_relation: HashMap<String, Vec<String>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every path `relation_id` held and bind it to `paths` instead.
    pub fn replace(&mut self, relation_id: &str, paths: Vec<String>) {
        self.remove(relation_id);
        if paths.is_empty() {
            return;
        }
        for path in &paths {
            self.bindings
                .entry(path.clone())
                .or_default()
                .insert(relation_id.to_string());
        }
        tracing::debug!(relation_id, paths = paths.len(), "paths registered");
        self.by_relation.insert(relation_id.to_string(), paths);
    }

    pub fn remove(&mut self, relation_id: &str) {
        let Some(old) = self.by_relation.remove(relation_id) else {
            return;
        };
        for path in old {
            if let Some(ids) = self.bindings.get_mut(&path) {
                ids.remove(relation_id);
                if ids.is_empty() {
                    self.bindings.remove(&path);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
        self.by_relation.clear();
    }

    /// Relation ids bound exactly at `path` (already normalized).
    pub fn resolve(&self, path: &str) -> Vec<String> {
        self.bindings
            .get(path)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Immediate children of `prefix` (already normalized), alphabetical.
    pub fn resolve_prefix(&self, prefix: &str) -> Vec<PathBinding> {
        let base = if prefix == "/" {
            "/".to_string()
        } else {
            format!("{prefix}/")
        };

        let mut children: BTreeMap<&str, PathBinding> = BTreeMap::new();
        for (path, ids) in self.bindings.range(base.clone()..) {
            let Some(rest) = path.strip_prefix(base.as_str()) else {
                break;
            };
            let (name, deeper) = match rest.split_once('/') {
                Some((name, _)) => (name, true),
                None => (rest, false),
            };
            if name.is_empty() {
                continue;
            }
            let child = children.entry(name).or_insert_with(|| PathBinding {
                path: format!("{base}{name}"),
                name: name.to_string(),
                relation_ids: Vec::new(),
                is_dir: false,
            });
            if deeper {
                child.is_dir = true;
            } else {
                child.relation_ids.extend(ids.iter().cloned());
            }
        }
        children.into_values().collect()
    }

    /// `true` when some binding lies strictly below `path`.
    pub fn has_children(&self, path: &str) -> bool {
        let base = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        self.bindings
            .range(base.clone()..)
            .next()
            .is_some_and(|(p, _)| p.starts_with(&base))
    }

    /// Total number of (path, relation) pairs.
    pub fn binding_count(&self) -> usize {
        self.bindings.values().map(BTreeSet::len).sum()
    }

    /// Every binding as `(path, ids)`, in path order.
    pub fn snapshot(&self) -> Vec<(String, Vec<String>)> {
        self.bindings
            .iter()
            .map(|(path, ids)| (path.clone(), ids.iter().cloned().collect()))
            .collect()
    }
}

/// Canonical form of a virtual path: leading `/`, no trailing `/`, no empty,
/// `.` or `..` segments. The root is `/`.
pub fn normalize(path: &str) -> Result<String, ValidationError> {
    let mut out = String::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => return Err(ValidationError::InvalidPath(path.to_string())),
            s => {
                out.push('/');
                out.push_str(s);
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_canonicalizes() {
        assert_eq!(normalize("").unwrap(), "/");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("tools//by-name/").unwrap(), "/tools/by-name");
        assert!(normalize("/tools/../etc").is_err());
    }

    #[test]
    fn replace_drops_old_paths() {
        let mut index = PathIndex::new();
        index.replace("t1", paths(&["/tools/by-name/a", "/tools/by-transform/x/a"]));
        index.replace("t1", paths(&["/tools/by-name/a", "/tools/by-transform/y/a"]));

        assert!(index.resolve("/tools/by-transform/x/a").is_empty());
        assert_eq!(index.resolve("/tools/by-transform/y/a"), vec!["t1"]);
        assert_eq!(index.binding_count(), 2);
    }

    #[test]
    fn resolve_prefix_returns_immediate_children_only() {
        let mut index = PathIndex::new();
        index.replace("t1", paths(&["/tools/by-transform/git/a"]));
        index.replace("t2", paths(&["/tools/by-transform/git/b", "/tools/by-transform/text/b"]));

        let children = index.resolve_prefix("/tools/by-transform");
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["git", "text"]);
        assert!(children.iter().all(|c| c.is_dir && c.relation_ids.is_empty()));

        let leaves = index.resolve_prefix("/tools/by-transform/git");
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].relation_ids, vec!["t1"]);
        assert!(!leaves[0].is_dir);
    }

    #[test]
    fn prefix_scan_does_not_leak_into_siblings() {
        let mut index = PathIndex::new();
        index.replace("t1", paths(&["/tools/by-name/a"]));
        index.replace("t2", paths(&["/tools/by-name-x/b"]));
        let children = index.resolve_prefix("/tools/by-name");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "a");
    }

    #[test]
    fn a_child_can_be_bound_and_have_children() {
        let mut index = PathIndex::new();
        index.replace("s1", paths(&["/memory/s1"]));
        index.replace("t1", paths(&["/memory/s1/generated/tool"]));

        let children = index.resolve_prefix("/memory");
        assert_eq!(children.len(), 1);
        assert!(children[0].is_dir);
        assert_eq!(children[0].relation_ids, vec!["s1"]);
        assert!(index.has_children("/memory/s1"));
        assert!(!index.has_children("/memory/s1/generated/tool"));
    }

    #[test]
    fn remove_clears_reverse_map() {
        let mut index = PathIndex::new();
        index.replace("t1", paths(&["/commands/a"]));
        index.remove("t1");
        index.replace("t1", paths(&["/commands/b"]));
        assert!(index.resolve("/commands/a").is_empty());
        assert_eq!(index.binding_count(), 1);
    }
}
