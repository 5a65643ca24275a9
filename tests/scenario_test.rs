mod helpers;

use helpers::{declare_tool, list_names, test_engine};
use relfs::search::QueryMode;
use relfs::vfs::ReadView;
use serde_json::{json, Value};

#[test]
fn git_haiku_end_to_end() {
    let (engine, _tmp) = test_engine();

    let outcome = declare_tool(&engine, json!({"name": "git-haiku", "transforms": ["git", "haiku"]}));
    let id = outcome.relation.id.clone();

    assert!(list_names(&engine, "/commands").contains(&"git-haiku".to_string()));

    let read = engine
        .read("/tools/by-name/git-haiku", ReadView::Auto)
        .unwrap()
        .unwrap();
    assert_eq!(read.view, ReadView::Info);
    let info: Value = serde_json::from_slice(&read.bytes).unwrap();
    assert_eq!(info["properties"]["transforms"], json!(["git", "haiku"]));
    assert_eq!(info["id"], json!(id));

    let hits = engine.search(&["haiku"], QueryMode::Or, Some(5)).unwrap();
    assert_eq!(hits[0].id, id);

    // Name and transforms both say "git", so the git rule kicks in once.
    let spawned: Vec<&str> = outcome.spawned.iter().map(|r| r.display_name()).collect();
    assert_eq!(spawned, vec!["git-status-enhanced"]);
    assert_eq!(
        list_names(&engine, "/tools/spawned-by/git-haiku"),
        vec!["git-status-enhanced"]
    );

    let stats = engine.stats().unwrap();
    assert_eq!(stats.active_relations, 2);
    assert_eq!(stats.auto_spawned_relations, 1);
    assert_eq!(stats.by_type["Tool"], 2);

    let history = engine.history(&id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operation, "declare");
}
