use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadPathParams {
    #[schemars(description = "Virtual file path, e.g. '/commands/log-analyzer'")]
    pub path: String,

    #[schemars(
        description = "'auto' (default: content when present, else properties), 'content' (cat) or 'info' (properties JSON)"
    )]
    pub view: Option<String>,
}
