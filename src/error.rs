//! Per-document failure types. Run-level plumbing uses `anyhow`.

use thiserror::Error;

/// The renderer could not open or read a document.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot open document {path}: {reason}")]
pub struct DocumentOpenError {
    pub path: String,
    pub reason: String,
}

impl DocumentOpenError {
    pub fn new(path: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A failed call to the structuring model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelCallError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("credentials rejected ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("model returned no text")]
    EmptyResponse,
}

impl ModelCallError {
    /// True when retrying other documents cannot succeed either.
    pub fn is_credentials(&self) -> bool {
        matches!(
            self,
            ModelCallError::MissingApiKey | ModelCallError::Unauthorized { .. }
        )
    }
}

/// Why a model response produced no records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseRejection {
    #[error("model reported that extraction was not possible")]
    ModelDeclined,

    #[error("missing columns {missing:?} (found {found:?})")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("malformed CSV: {0}")]
    Malformed(String),

    #[error("CSV has a header but no rows")]
    NoRows,
}
