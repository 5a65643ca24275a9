//! MCP `search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Query text; split into lowercase words")]
    pub query: String,

    #[schemars(
        description = "'or' (default: any word, ranked by matches), 'and' (every word) or 'phrase' (words in order)"
    )]
    pub mode: Option<String>,

    #[schemars(description = "Maximum results. Defaults to the configured limit (10).")]
    pub limit: Option<usize>,

    #[schemars(description = "Drop results below the configured relevance threshold. Defaults to false.")]
    pub relevant_only: Option<bool>,
}
