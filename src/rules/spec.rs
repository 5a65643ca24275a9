//! Rules as data: the TOML shape of a rule and its compiled form.
//!
//! A [`RuleSpec`] is what a rule file says; [`Rule`] is the validated,
//! lowercased version the engine interprets.

use serde::Deserialize;

use crate::error::ValidationError;
use crate::relations::{Properties, RelationType};

/// Top level of a rule file: a list of `[[rule]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub when: ConditionSpec,
    #[serde(default)]
    pub spawn: Vec<SpawnSpec>,
}

fn enabled_by_default() -> bool {
    true
}

/// When a rule applies. Every populated field must be satisfied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConditionSpec {
    /// Only relations of this type trigger the rule. Empty means any type.
    pub relation_type: String,
    /// Case-insensitive substrings looked for in the relation's name.
    pub name_patterns: Vec<String>,
    /// Case-insensitive substrings looked for in each transform tag.
    pub transform_patterns: Vec<String>,
    /// Case-insensitive substrings looked for in the description.
    pub description_patterns: Vec<String>,
    /// Exact transform tags; at least one must be present.
    pub any_transforms: Vec<String>,
    pub min_transforms: usize,
    /// How many of the three pattern categories must match on their own.
    pub min_signals: usize,
    /// Alternatively: how many non-spawned relations (this one included) must
    /// match at least one pattern category. Zero disables clustering.
    pub cluster_threshold: usize,
}

impl Default for ConditionSpec {
    fn default() -> Self {
        Self {
            relation_type: String::new(),
            name_patterns: Vec::new(),
            transform_patterns: Vec::new(),
            description_patterns: Vec::new(),
            any_transforms: Vec::new(),
            min_transforms: 0,
            min_signals: 1,
            cluster_threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpawnSpec {
    pub relation_type: String,
    /// Key of the spawned relation; `{name}` expands to the trigger's name.
    pub name: String,
    /// `{name}` expands inside strings; a value of exactly `"{transforms}"`
    /// becomes the trigger's transforms list.
    #[serde(default)]
    pub properties: Properties,
}

/// A compiled, ready-to-evaluate rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub enabled: bool,
    pub condition: Condition,
    pub spawns: Vec<SpawnTarget>,
}

#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub relation_type: Option<RelationType>,
    pub name_patterns: Vec<String>,
    pub transform_patterns: Vec<String>,
    pub description_patterns: Vec<String>,
    pub any_transforms: Vec<String>,
    pub min_transforms: usize,
    pub min_signals: usize,
    pub cluster_threshold: usize,
}

impl Condition {
    pub fn has_patterns(&self) -> bool {
        !(self.name_patterns.is_empty()
            && self.transform_patterns.is_empty()
            && self.description_patterns.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct SpawnTarget {
    pub relation_type: RelationType,
    pub name: String,
    pub properties: Properties,
}

impl Rule {
    /// Validate a spec and compile it.
    pub fn compile(spec: RuleSpec) -> Result<Self, ValidationError> {
        if spec.id.trim().is_empty() {
            return Err(ValidationError::InvalidProperty {
                property: "rule.id".into(),
                reason: "must not be empty".into(),
            });
        }
        if spec.spawn.is_empty() {
            return Err(ValidationError::InvalidProperty {
                property: format!("rule.{}.spawn", spec.id),
                reason: "a rule needs at least one spawn target".into(),
            });
        }

        let when = spec.when;
        let relation_type = if when.relation_type.is_empty() {
            None
        } else {
            Some(when.relation_type.parse()?)
        };

        let spawns = spec
            .spawn
            .into_iter()
            .map(|s| {
                if s.name.trim().is_empty() {
                    return Err(ValidationError::InvalidProperty {
                        property: format!("rule.{}.spawn.name", spec.id),
                        reason: "must not be empty".into(),
                    });
                }
                Ok(SpawnTarget {
                    relation_type: s.relation_type.parse()?,
                    name: s.name,
                    properties: s.properties,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: spec.id,
            description: spec.description,
            enabled: spec.enabled,
            condition: Condition {
                relation_type,
                name_patterns: lowercase(when.name_patterns),
                transform_patterns: lowercase(when.transform_patterns),
                description_patterns: lowercase(when.description_patterns),
                any_transforms: when.any_transforms,
                min_transforms: when.min_transforms,
                min_signals: when.min_signals,
                cluster_threshold: when.cluster_threshold,
            },
            spawns,
        })
    }
}

fn lowercase(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse a rule file. Invalid TOML is reported with the parser's message.
pub fn parse_rule_file(contents: &str) -> Result<Vec<RuleSpec>, ValidationError> {
    toml::from_str::<RuleFile>(contents)
        .map(|file| file.rules)
        .map_err(|e| ValidationError::InvalidProperty {
            property: "rules".into(),
            reason: e.to_string(),
        })
}
