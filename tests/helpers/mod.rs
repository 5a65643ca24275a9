#![allow(dead_code)]

use relfs::config::RelfsConfig;
use relfs::engine::{DeclareOutcome, DeclareRequest, Engine};
use relfs::relations::{Properties, RelationType};
use relfs::vfs::Entry;
use serde_json::Value;
use tempfile::TempDir;

/// Engine on a fresh data directory with the built-in rules.
pub fn test_engine() -> (Engine, TempDir) {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(RelfsConfig::with_data_dir(tmp.path())).unwrap();
    (engine, tmp)
}

/// Engine on a fresh data directory with no rules at all.
pub fn bare_engine() -> (Engine, TempDir) {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(bare_config(&tmp)).unwrap();
    (engine, tmp)
}

pub fn bare_config(tmp: &TempDir) -> RelfsConfig {
    let mut config = RelfsConfig::with_data_dir(tmp.path());
    config.rules.use_defaults = false;
    config
}

pub fn props(value: Value) -> Properties {
    value.as_object().cloned().expect("properties must be a JSON object")
}

pub fn declare(engine: &Engine, relation_type: RelationType, value: Value) -> DeclareOutcome {
    engine
        .declare(DeclareRequest::new(relation_type, props(value)))
        .unwrap()
}

pub fn declare_tool(engine: &Engine, value: Value) -> DeclareOutcome {
    declare(engine, RelationType::Tool, value)
}

pub fn names(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// Names listed at `path`; panics if the path does not exist.
pub fn list_names(engine: &Engine, path: &str) -> Vec<String> {
    engine
        .list(path)
        .unwrap()
        .unwrap_or_else(|| panic!("{path} should exist"))
        .into_iter()
        .map(|e| e.name)
        .collect()
}
