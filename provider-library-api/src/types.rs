//! Wire types private to the library API

use serde::{Deserialize, Serialize};

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Request body of the picker session endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmptyBody {}

/// Extract the human-readable message from an error response body
///
/// Prefers the JSON `message` field, falls back to the raw text, and finally
/// to a generic message for empty bodies.
pub fn error_message_from_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&text) {
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        "An error occurred".to_string()
    } else {
        trimmed.to_string()
    }
}
