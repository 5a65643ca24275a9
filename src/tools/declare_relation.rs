//! MCP `declare_relation` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeclareRelationParams {
    #[schemars(description = "Relation type: 'Tool', 'Artifact', 'URLArtifact' or 'MemorySession'")]
    pub r#type: String,

    #[schemars(
        description = "Property bag. Tool and Artifact need 'name', URLArtifact needs 'url', MemorySession needs 'agent'. Tools usually carry 'transforms' (list of tags), 'description' and 'parent'."
    )]
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,

    #[schemars(description = "Optional UTF-8 content stored with the relation (script body, document text)")]
    pub content: Option<String>,

    #[schemars(description = "'merge' (default) overlays the existing properties, 'replace' swaps them out")]
    pub mode: Option<String>,
}
