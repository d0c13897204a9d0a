//! Pipeline state machine and shared status.
//!
//! [`PipelineState`] is the coordinator's state.  Anything that wants to
//! display progress (a tray icon, a status line) reads it through
//! [`SharedStatus`].

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the conversion pipeline.
///
/// ```text
/// Idle ──image detected──▶ Converting
///      ──conversion settles──▶ Suspended
///                              ──resume delay elapsed──▶ Idle
/// ```
///
/// While `Suspended` the watcher is stopped, so the pipeline's own
/// clipboard write is never picked up as a new change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Watching the clipboard (or disabled and waiting for a reload).
    #[default]
    Idle,

    /// A conversion settled; waiting out the resume delay.
    Suspended,

    /// An image is being converted by the active backend.
    Converting,
}

impl PipelineState {
    /// Returns `true` while a conversion or its aftermath is in progress.
    ///
    /// ```
    /// use formula_clip::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Converting.is_busy());
    /// assert!(PipelineState::Suspended.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, PipelineState::Idle)
    }

    /// A short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Suspended => "Suspended",
            PipelineState::Converting => "Converting",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// Snapshot of what the pipeline is doing and what it last produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineStatus {
    /// Current phase.
    pub state: PipelineState,

    /// Mirrors the `enabled` setting as of the last reload or settle.
    pub enabled: bool,

    /// `true` while the clipboard watcher is polling.
    pub watching: bool,

    /// The most recent formula written to the clipboard.
    pub last_formula: Option<String>,

    /// Description of the most recent failure.  Cleared by a success.
    pub last_error: Option<String>,

    /// Number of successful conversions since start.
    pub conversions: u64,
}

// ---------------------------------------------------------------------------
// SharedStatus
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`PipelineStatus`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedStatus = Arc<Mutex<PipelineStatus>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(PipelineStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
