use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unavailable,
    NotFound,
}

/// Error payload produced by the console itself when a call cannot reach the
/// binder. Rendered exactly like a rejection coming back from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid band '{0}': expected AM or FM")]
    UnknownBand(String),
    #[error("invalid stereo mode '{0}': expected mono or stereo")]
    UnknownStereoMode(String),
    #[error("invalid event topic '{0}': expected frequency or station_found")]
    UnknownTopic(String),
    #[error("invalid scan direction '{0}': expected forward or backward")]
    UnknownScanDirection(String),
    #[error("invalid verb path '{0}': expected api/verb")]
    MalformedVerbPath(String),
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} '{value}' must not contain '/' or whitespace")]
    IllegalCharacter { field: &'static str, value: String },
}
