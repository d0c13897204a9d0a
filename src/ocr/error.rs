//! Error taxonomy shared by every OCR backend.
//!
//! Each backend classifies its own failures into [`OcrError`]; nothing above
//! the backend boundary re-classifies them.

use thiserror::Error;

/// Why an image could not be turned into a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    /// The selected remote backend has no token / API key configured.
    #[error("no credentials configured for the {backend} backend")]
    CredentialsMissing { backend: &'static str },

    /// No usable Python interpreter was found for the local backend.
    #[error("Python 3 is not installed")]
    RuntimeMissing,

    /// The interpreter ran but a recognition module is missing.
    #[error("recognition dependency missing: {0}")]
    DependencyMissing(String),

    /// The remote service rejected the configured credentials.
    #[error("invalid API credentials")]
    InvalidCredentials,

    /// The remote service refused the request because of rate limits.
    #[error("API rate limit exceeded, try again later")]
    RateLimited,

    /// The request or process did not finish within its time limit.
    #[error("request timed out")]
    Timeout,

    /// Any other network failure.
    #[error("network error: {0}")]
    Transport(String),

    /// Non-2xx response or non-zero exit not covered by another kind.
    #[error("backend error ({code}): {message}")]
    Backend { code: i32, message: String },

    /// The response arrived but did not contain a formula where expected.
    #[error("failed to parse backend response: {0}")]
    ResponseUnparseable(String),

    /// The backend answered with nothing but whitespace.
    #[error("no formula detected in the image")]
    NoFormulaDetected,

    /// The image could not be encoded or written for the backend.
    #[error("failed to encode image: {0}")]
    ImageEncodingFailed(String),
}

impl OcrError {
    /// `true` for failures the user fixes through setup rather than by
    /// retrying: missing or rejected credentials, missing runtime or
    /// dependency.
    pub fn needs_setup(&self) -> bool {
        matches!(
            self,
            OcrError::CredentialsMissing { .. }
                | OcrError::InvalidCredentials
                | OcrError::RuntimeMissing
                | OcrError::DependencyMissing(_)
        )
    }
}

impl From<reqwest::Error> for OcrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OcrError::Timeout
        } else {
            OcrError::Transport(e.to_string())
        }
    }
}

/// Trim backend output and reject blank results.
///
/// Every backend funnels its raw text through here so whitespace-only output
/// is always [`OcrError::NoFormulaDetected`].
pub fn finish_formula(raw: &str) -> Result<String, OcrError> {
    let formula = raw.trim();
    if formula.is_empty() {
        Err(OcrError::NoFormulaDetected)
    } else {
        Ok(formula.to_string())
    }
}
