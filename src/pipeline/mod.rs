//! Pipeline module for formula-clip.
//!
//! This module wires the clipboard watcher to the OCR dispatcher and exposes
//! the shared status that presentation code reads.
//!
//! # Architecture
//!
//! ```text
//! ClipboardWatcher ──ClipboardEvent (mpsc)──┐
//!                                           ▼
//! CoordinatorHandle ──PipelineCommand──▶ Coordinator::run()  ← tokio task
//!                                           │
//!                                           ├─ Image while Idle → spawn(Dispatcher::convert)
//!                                           ├─ settle → write_text + Presenter
//!                                           └─ resume delay → watcher re-armed
//!
//! SharedStatus (Arc<Mutex<PipelineStatus>>) ←── read by presentation code
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formula_clip::clipboard::ArboardClipboard;
//! use formula_clip::config::{new_shared_config, AppConfig};
//! use formula_clip::notify::LogPresenter;
//! use formula_clip::ocr::Dispatcher;
//! use formula_clip::pipeline::Coordinator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap_or_default();
//!     let dispatcher = Arc::new(Dispatcher::from_config(&config));
//!     let (coordinator, handle) = Coordinator::new(
//!         new_shared_config(config),
//!         dispatcher,
//!         Arc::new(ArboardClipboard::new()),
//!         Arc::new(LogPresenter),
//!     );
//!
//!     let task = tokio::spawn(coordinator.run());
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown().await.ok();
//!     task.await.ok();
//! }
//! ```

pub mod coordinator;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::{Coordinator, CoordinatorClosed, CoordinatorHandle, PipelineCommand};
pub use state::{new_shared_status, PipelineState, PipelineStatus, SharedStatus};
