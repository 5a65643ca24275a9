//! Rule engine: reacts to every declared relation by proposing new ones.
//!
//! Rules are data ([`spec`]); this module is the interpreter. Evaluation never
//! declares anything itself. It returns [`SpawnRequest`]s which the engine
//! queues and drains after the triggering declare has released its lock.

pub mod spec;

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::RulesConfig;
use crate::relations::{Properties, Relation, RelationStore, RelationType};

pub use spec::{parse_rule_file, Condition, Rule, RuleSpec, SpawnTarget};

/// Rule set compiled into the binary.
pub const DEFAULT_RULES: &str = include_str!("default_rules.toml");

/// A relation a rule wants declared.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub rule_id: String,
    pub trigger_id: String,
    pub relation_type: RelationType,
    pub properties: Properties,
}

/// Ordered rule registry, built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config: defaults first (if enabled), then the
    /// optional rule file, then per-rule enabled overrides.
    pub fn from_config(config: &RulesConfig, rules_file: Option<&Path>) -> Result<Self> {
        let mut engine = Self::new();
        if config.use_defaults {
            engine.load_str(DEFAULT_RULES).context("invalid built-in rules")?;
        }
        if let Some(path) = rules_file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read rule file {}", path.display()))?;
            engine
                .load_str(&contents)
                .with_context(|| format!("invalid rule file {}", path.display()))?;
        }
        for (id, enabled) in &config.enabled {
            if !engine.set_enabled(id, *enabled) {
                tracing::warn!(rule = %id, "enabled override names an unknown rule");
            }
        }
        tracing::info!(
            rules = engine.rules.len(),
            enabled = engine.rules.iter().filter(|r| r.enabled).count(),
            "rule engine ready"
        );
        Ok(engine)
    }

    /// Parse and register every rule in a TOML document.
    pub fn load_str(&mut self, contents: &str) -> Result<()> {
        for spec in parse_rule_file(contents)? {
            self.register(Rule::compile(spec)?);
        }
        Ok(())
    }

    /// Append a rule. A rule with an id already registered replaces it in place.
    pub fn register(&mut self, rule: Rule) {
        if let Some(existing) = self.rules.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule;
        } else {
            self.rules.push(rule);
        }
    }

    pub fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every enabled rule against `relation`, in registration order.
    ///
    /// `relations` must already contain `relation`. Only spawn targets that do
    /// not exist yet are returned, so re-evaluating a converged store yields
    /// nothing.
    pub fn evaluate(&self, relation: &Relation, relations: &RelationStore) -> Vec<SpawnRequest> {
        // Spawned relations never trigger rules.
        if relation.is_auto_spawned() || relation.is_deleted() {
            return Vec::new();
        }

        let mut requests: Vec<SpawnRequest> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.enabled) {
            if !condition_matches(&rule.condition, relation, relations) {
                continue;
            }

            let missing: Vec<&SpawnTarget> = rule
                .spawns
                .iter()
                .filter(|target| {
                    let key = render(&target.name, relation);
                    let exists = relations.load_by_key(target.relation_type, &key).is_some();
                    let queued = requests.iter().any(|r| {
                        r.relation_type == target.relation_type
                            && r.properties.get(target.relation_type.key_property())
                                == Some(&Value::String(key.clone()))
                    });
                    !exists && !queued
                })
                .collect();
            if missing.is_empty() {
                continue;
            }

            tracing::info!(
                rule = %rule.id,
                relation_id = %relation.id,
                spawns = missing.len(),
                "rule matched"
            );
            for target in missing {
                requests.push(spawn_request(rule, target, relation));
            }
        }
        requests
    }
}

fn condition_matches(condition: &Condition, relation: &Relation, relations: &RelationStore) -> bool {
    if let Some(ty) = condition.relation_type {
        if relation.relation_type != ty {
            return false;
        }
    }

    let transforms = relation.string_list("transforms");
    if transforms.len() < condition.min_transforms {
        return false;
    }
    if !condition.any_transforms.is_empty()
        && !condition
            .any_transforms
            .iter()
            .any(|t| transforms.contains(&t.as_str()))
    {
        return false;
    }

    if !condition.has_patterns() {
        return true;
    }

    let own = signals(condition, relation);
    if own == 0 {
        return false;
    }
    if own >= condition.min_signals {
        return true;
    }
    if condition.cluster_threshold == 0 {
        return false;
    }

    let others = relations
        .load_by_type(relation.relation_type, false)
        .into_iter()
        .filter(|r| r.id != relation.id && !r.is_auto_spawned())
        .filter(|r| signals(condition, r) > 0)
        .count();
    others + 1 >= condition.cluster_threshold
}

/// Number of pattern categories (name, transforms, description) with a hit.
fn signals(condition: &Condition, relation: &Relation) -> usize {
    let hit = |patterns: &[String], haystack: &str| {
        let haystack = haystack.to_lowercase();
        patterns.iter().any(|p| haystack.contains(p.as_str()))
    };

    let name = hit(&condition.name_patterns, relation.display_name());
    let transforms = relation
        .string_list("transforms")
        .into_iter()
        .any(|t| hit(&condition.transform_patterns, t));
    let description = relation
        .str_prop("description")
        .is_some_and(|d| hit(&condition.description_patterns, d));

    [name, transforms, description].into_iter().filter(|&b| b).count()
}

fn spawn_request(rule: &Rule, target: &SpawnTarget, trigger: &Relation) -> SpawnRequest {
    let mut properties: Properties = target
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), render_value(v, trigger)))
        .collect();
    properties.insert(
        target.relation_type.key_property().to_string(),
        Value::String(render(&target.name, trigger)),
    );
    properties.insert("auto_spawned".into(), Value::Bool(true));
    properties.insert("spawned_by".into(), Value::String(trigger.id.clone()));
    properties.insert("spawned_by_rule".into(), Value::String(rule.id.clone()));

    SpawnRequest {
        rule_id: rule.id.clone(),
        trigger_id: trigger.id.clone(),
        relation_type: target.relation_type,
        properties,
    }
}

/// A property value that is exactly this string becomes the trigger's
/// transforms list.
const TRANSFORMS_TEMPLATE: &str = "{transforms}";

fn render(template: &str, trigger: &Relation) -> String {
    template.replace("{name}", trigger.display_name())
}

fn render_value(value: &Value, trigger: &Relation) -> Value {
    match value {
        Value::String(s) if s == TRANSFORMS_TEMPLATE => Value::Array(
            trigger
                .string_list("transforms")
                .into_iter()
                .map(|t| Value::String(t.to_string()))
                .collect(),
        ),
        Value::String(s) => Value::String(render(s, trigger)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, trigger)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, trigger)))
                .collect(),
        ),
        other => other.clone(),
    }
}
