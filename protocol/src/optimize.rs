use serde::Deserialize;
use serde::Serialize;

/// JSON body of `POST /optimize_prompt`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OptimizePromptRequest {
    pub prompt: String,
}

/// Successful answer of `POST /optimize_prompt`. Both fields are always present.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OptimizePromptResponse {
    pub original_prompt: String,
    pub optimized_prompt: String,
}
