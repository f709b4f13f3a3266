//! Result envelope carried in JSON response bodies.
//!
//! Instrumented handlers answer with `{code, message, data}`. The common
//! capitalized spellings (`Code`, `Msg`, `Message`, `Data`) are accepted as
//! aliases because many upstream services emit Go-style field names.
//!
//! `data` is kept as `RawValue`: the extractor never looks inside it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, value::RawValue, Number};

use crate::error::{MetricsError, Result};

/// Application-level result code (numeric or symbolic).
///
/// Any JSON number is accepted: signed, unsigned beyond `i64::MAX`, or float.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResultCode {
    Number(Number),
    Text(String),
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Number(n) => write!(f, "{n}"),
            ResultCode::Text(s) => f.write_str(s),
        }
    }
}

/// Response body envelope.
#[derive(Debug, Deserialize)]
pub struct ResultEnvelope {
    /// Result code.
    #[serde(alias = "Code")]
    pub code: ResultCode,
    /// Human-readable message, used as the classification label.
    #[serde(alias = "Message", alias = "msg", alias = "Msg")]
    pub message: String,
    /// Opaque payload, stored as raw JSON.
    #[serde(default, alias = "Data")]
    pub data: Option<Box<RawValue>>,
}

/// Which envelope field becomes the error-code label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    #[default]
    Message,
    Code,
}

/// A code/message pair handlers answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode {
    pub code: i64,
    pub message: &'static str,
}

impl ResponseCode {
    pub const fn new(code: i64, message: &'static str) -> Self {
        Self { code, message }
    }

    /// Build the envelope JSON for this code with the given payload.
    pub fn with_data<T: Serialize>(self, data: T) -> serde_json::Value {
        json!({
            "code": self.code,
            "message": self.message,
            "data": data,
        })
    }
}

/// Parse a captured body into a `ResultEnvelope`.
pub fn parse_envelope(body: &[u8]) -> Result<ResultEnvelope> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(MetricsError::ExtractionFailed("empty body".into()));
    }
    serde_json::from_slice(body)
        .map_err(|e| MetricsError::ExtractionFailed(format!("invalid envelope json: {e}")))
}

/// Extract the classification label from a captured body.
///
/// Fails with `ExtractionFailed` for empty bodies, non-JSON or non-conforming
/// bodies, and envelopes whose message is blank.
pub fn extract_label(body: &[u8], source: LabelSource) -> Result<String> {
    let env = parse_envelope(body)?;
    match source {
        LabelSource::Message => {
            if env.message.trim().is_empty() {
                return Err(MetricsError::ExtractionFailed(
                    "envelope message is empty".into(),
                ));
            }
            Ok(env.message)
        }
        LabelSource::Code => Ok(env.code.to_string()),
    }
}
