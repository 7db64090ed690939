use serde::{Deserialize, Serialize};
use serde_json::json;

/// Body used when a response payload cannot be serialized
const SERIALIZATION_FAILURE_BODY: &str = r#"{"message":"Internal Server Error"}"#;

/// Incoming request envelope; only the raw body is read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub body: Option<String>,
}

impl Request {
    pub fn with_body(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()) }
    }

    /// Raw body text; a missing body reads as empty
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Outgoing response envelope with a JSON-encoded body string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    /// Encode `payload` as the body
    pub fn json<T: Serialize + ?Sized>(status_code: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self { status_code, body },
            Err(e) => {
                log::error!("Failed to serialize response body: {}", e);
                Self {
                    status_code: 500,
                    body: SERIALIZATION_FAILURE_BODY.to_string(),
                }
            }
        }
    }

    /// `{"message": ...}` body
    pub fn message(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({ "message": message }))
    }

    /// Decode the body back into JSON
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}
