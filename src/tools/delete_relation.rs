use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteRelationParams {
    #[schemars(description = "ID of the relation to soft-delete")]
    pub id: String,
}
