//! System clipboard access and change detection.
//!
//! # Architecture
//!
//! ```text
//! ClipboardSource (trait) ◀── ArboardClipboard (system) / MockClipboard (tests)
//!        │
//!        ▼
//! ClipboardWatcher ── poll every interval ──▶ ClipboardEvent (mpsc)
//!                                             ├─ Image(ClipImage)
//!                                             └─ ChangedWithoutImage
//! ```

pub mod image;
pub mod system;
pub mod watcher;

#[cfg(test)]
pub mod mock;

use std::path::PathBuf;

use thiserror::Error;

pub use self::image::ClipImage;
pub use system::ArboardClipboard;
pub use watcher::{ClipboardEvent, ClipboardWatcher};

#[cfg(test)]
pub use mock::MockClipboard;

// ---------------------------------------------------------------------------
// ClipboardError
// ---------------------------------------------------------------------------

/// Errors from the clipboard collaborator.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Could not open the system clipboard.
    #[error("cannot access clipboard: {0}")]
    Access(String),

    /// Could not write text to the clipboard.
    #[error("cannot set clipboard text: {0}")]
    Write(String),
}

// ---------------------------------------------------------------------------
// ClipboardSource
// ---------------------------------------------------------------------------

/// The operations the pipeline needs from a clipboard.
///
/// All calls are synchronous and may block.  The watcher polls from tokio's
/// blocking pool.
pub trait ClipboardSource: Send + Sync {
    /// Counter that changes whenever the clipboard contents change.
    fn change_counter(&self) -> u64;

    /// Image currently on the clipboard, if any.
    fn read_image(&self) -> Option<ClipImage>;

    /// File paths currently on the clipboard, in clipboard order.
    fn read_file_references(&self) -> Vec<PathBuf>;

    /// Replace the clipboard contents with `text`.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}
