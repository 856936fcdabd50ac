//! Error types for GeoChat.
//!
//! `Display` on [`LocationError`] is what the user sees in the error banner.
//! [`ChatError`] is only ever logged; the session shows a fixed message instead.

use thiserror::Error;

/// Text shown for any failed backend request.
pub const RESPONSE_FAILED: &str =
    "Failed to get response from AI. Please check your connection and API key.";

/// Text shown when a message is submitted before the location is known.
pub const LOCATION_REQUIRED: &str = "Cannot send message without your location.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// No geolocation capability on this host
    #[error("Geolocation is not supported on this system.")]
    Unsupported,

    /// The lookup answered, but refused to give a position
    #[error("Location access is required to use this app. Please enable it in your settings. Error: {0}")]
    Denied(String),

    /// The lookup could not be completed
    #[error("Location access is required to use this app. Please enable it in your settings. Error: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no API key configured and no proxy base URL set")]
    MissingCredentials,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::MalformedResponse(err.to_string())
        } else {
            ChatError::Request(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DictationError {
    #[error("no dictation command configured")]
    NotConfigured,

    #[error("could not start dictation: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_error_text_carries_reason() {
        let err = LocationError::Denied("User denied Geolocation".to_string());
        let text = err.to_string();
        assert!(text.starts_with("Location access is required"));
        assert!(text.ends_with("Error: User denied Geolocation"));
    }

    #[test]
    fn test_unsupported_text_is_distinct() {
        let unsupported = LocationError::Unsupported.to_string();
        let unavailable = LocationError::Unavailable("timeout".to_string()).to_string();
        assert_ne!(unsupported, unavailable);
        assert!(unsupported.contains("not supported"));
    }
}
