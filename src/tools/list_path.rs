//! MCP `list_path` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListPathParams {
    /// Virtual directory to list; `/` when absent.
    #[schemars(description = "Virtual directory, e.g. '/tools/by-transform/log'. Defaults to '/'.")]
    pub path: Option<String>,
}
