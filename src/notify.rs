//! Presentation collaborator: how conversion outcomes reach the user.
//!
//! The pipeline only talks to the [`Presenter`] trait.  Calls are
//! fire-and-forget; a presenter must not block for long.
//!
//! [`LogPresenter`] renders everything through the logger, which is what the
//! headless binary uses.

use crate::clipboard::ClipboardError;
use crate::ocr::OcrError;

/// Install command shown when the local recognizer is missing.
pub const INSTALL_COMMAND: &str = "pip3 install pix2tex pillow";

/// Maximum characters of a formula shown in a success notice.
const PREVIEW_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Presenter trait
// ---------------------------------------------------------------------------

pub trait Presenter: Send + Sync {
    /// A formula was written to the clipboard.
    fn notify_success(&self, formula: &str);

    /// A conversion failed for a reason setup cannot fix.
    fn notify_failure(&self, error: &OcrError);

    /// Credentials or a recognition dependency need the user's attention.
    fn prompt_setup_required(&self, reason: &OcrError);

    /// No interpreter was found for the local backend.
    fn prompt_runtime_missing(&self);

    /// A formula was recognised but could not be put on the clipboard.
    fn notify_write_failed(&self, error: &ClipboardError);
}

/// Route `error` to the matching presenter call.
pub fn present_failure(presenter: &dyn Presenter, error: &OcrError) {
    match error {
        OcrError::RuntimeMissing => presenter.prompt_runtime_missing(),
        e if e.needs_setup() => presenter.prompt_setup_required(e),
        e => presenter.notify_failure(e),
    }
}

/// First 50 characters of `formula`, with `...` when truncated.
pub fn preview(formula: &str) -> String {
    let mut chars = formula.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

// ---------------------------------------------------------------------------
// LogPresenter
// ---------------------------------------------------------------------------

/// Presents outcomes as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn notify_success(&self, formula: &str) {
        log::info!("LaTeX converted: {}", preview(formula));
    }

    fn notify_failure(&self, error: &OcrError) {
        log::error!("Conversion failed: {error}");
    }

    fn prompt_setup_required(&self, reason: &OcrError) {
        match reason {
            OcrError::DependencyMissing(_) => log::warn!(
                "Setup required: pix2tex is not installed. Run `{INSTALL_COMMAND}` and try again."
            ),
            OcrError::CredentialsMissing { backend } => log::warn!(
                "Setup required: no credentials configured for the {backend} backend. \
                 Add them to settings.toml."
            ),
            other => log::warn!("Setup required: {other}. Check your credentials in settings.toml."),
        }
    }

    fn prompt_runtime_missing(&self) {
        log::warn!(
            "Python 3 is required for the local backend. Install Python 3, then run `{INSTALL_COMMAND}`."
        );
    }

    fn notify_write_failed(&self, error: &ClipboardError) {
        log::error!("LaTeX recognised but not copied: {error}");
    }
}

// ---------------------------------------------------------------------------
// RecordingPresenter (tests only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use recording::{Notice, RecordingPresenter};


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
