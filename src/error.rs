//! Error type shared by the web form and the processor.

use thiserror::Error;

/// Every fallible operation in the crate returns this error.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before any external call was made.
    #[error("{0}")]
    Validation(String),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    #[error("Worksheet {0} not found")]
    WorksheetNotFound(usize),

    #[error("The model returned no text{}", .0.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EmptyResponse(Option<String>),

    #[error("Template: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, JournalError>;

impl JournalError {
    /// Builds an `Api` error from a non-success response body.
    ///
    /// Google APIs wrap failures as `{"error": {"message": ...}}`; anything
    /// else is passed through as raw text.
    pub fn from_api_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        JournalError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_body_message_is_extracted() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        let err = JournalError::from_api_body(403, body);
        assert_eq!(
            err.to_string(),
            "API error 403: The caller does not have permission"
        );
    }

    #[test]
    fn api_body_falls_back_to_raw_text() {
        let err = JournalError::from_api_body(502, "  Bad Gateway\n");
        assert_eq!(err.to_string(), "API error 502: Bad Gateway");
    }

    #[test]
    fn empty_response_mentions_reason() {
        assert_eq!(
            JournalError::EmptyResponse(Some("SAFETY".into())).to_string(),
            "The model returned no text (SAFETY)"
        );
        assert_eq!(
            JournalError::EmptyResponse(None).to_string(),
            "The model returned no text"
        );
    }
}
