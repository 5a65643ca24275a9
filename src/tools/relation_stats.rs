//! MCP `relation_stats` and `rebuild_index` tool parameter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `relation_stats` MCP tool.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RelationStatsParams {
    /// Restrict the per-type breakdown to one relation type.
    #[schemars(description = "Optional relation type to report on")]
    pub r#type: Option<String>,
}

/// Parameters for the `rebuild_index` MCP tool.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RebuildIndexParams {
    #[schemars(description = "Return every path binding after the rebuild. Defaults to false.")]
    pub include_paths: Option<bool>,
}
