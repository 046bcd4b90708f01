use serde::Deserialize;
use serde::Serialize;

/// Body returned by the backend alongside a non-success status.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Best-effort extraction of the server message from a raw body.
    ///
    /// Returns `None` when the body is not JSON, has no `error` field, or the field is blank.
    pub fn message_from_body(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorResponse>(body)
            .ok()
            .and_then(|response| response.error)
            .filter(|message| !message.trim().is_empty())
    }
}
