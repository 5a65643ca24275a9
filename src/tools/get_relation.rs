use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetRelationParams {
    #[schemars(description = "Relation ID, e.g. 'tool-log-analyzer-3f9a0c12d4e5'")]
    pub id: String,

    #[schemars(description = "Include the audit trail (declares, updates, spawns, deletes). Defaults to false.")]
    pub history: Option<bool>,
}
