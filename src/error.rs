use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;

/// Failure modes surfaced by the translation pipeline. Everything fatal ends
/// up recorded in the owning session before it propagates to the caller.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("failed to parse content: {0}")]
    Parse(String),

    #[error("no translatable content found in HTML")]
    EmptyContent,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error(
        "request timed out after {}s; try a smaller document or a different model",
        .0.as_secs()
    )]
    Timeout(Duration),

    #[error("model endpoint returned HTTP {status}: {detail}")]
    Endpoint { status: u16, detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TranslateError {
    /// True for failures detected before the first model call.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::EmptyContent | Self::InvalidModel(_))
    }
}
