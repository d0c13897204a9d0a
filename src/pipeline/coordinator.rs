//! Pipeline coordinator: clipboard events in, formulas out.
//!
//! [`Coordinator`] owns the [`ClipboardWatcher`] and reacts to its events and
//! to [`PipelineCommand`]s sent through a [`CoordinatorHandle`].
//!
//! # Conversion cycle
//!
//! ```text
//! ClipboardEvent::Image   (Idle only; dropped otherwise)
//!   └─▶ spawn(dispatcher.convert)                       [Converting]
//!         └─▶ settle: stop watcher, drain stale events   [Suspended]
//!               ├─ Ok  → write formula, notify_success (notify_write_failed)
//!               └─ Err → present_failure
//!               └─▶ after resume delay: restart watcher
//!                   if still enabled                     [Idle]
//! ```
//!
//! The conversion runs as its own task, so commands keep being served while
//! a backend call is outstanding.  A conversion is never cancelled.

use std::future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use crate::clipboard::{ClipImage, ClipboardEvent, ClipboardSource, ClipboardWatcher};
use crate::config::{AppConfig, SharedConfig};
use crate::notify::{present_failure, Presenter};
use crate::ocr::{Dispatcher, OcrError};

use super::state::{new_shared_status, PipelineState, PipelineStatus, SharedStatus};

/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 8;

type Conversion = JoinHandle<Result<String, OcrError>>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Re-read the shared settings and apply them.
    Reload,
    /// Stop watching and exit once any in-flight conversion has settled.
    Shutdown,
}

/// Returned by [`CoordinatorHandle`] once the coordinator has exited.
#[derive(Debug, Error)]
#[error("pipeline coordinator has exited")]
pub struct CoordinatorClosed;

/// Cloneable sender for [`PipelineCommand`]s.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<PipelineCommand>,
}

impl CoordinatorHandle {
    pub async fn reload(&self) -> Result<(), CoordinatorClosed> {
        self.send(PipelineCommand::Reload).await
    }

    pub async fn shutdown(&self) -> Result<(), CoordinatorClosed> {
        self.send(PipelineCommand::Shutdown).await
    }

    pub async fn send(&self, command: PipelineCommand) -> Result<(), CoordinatorClosed> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoordinatorClosed)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives the watch → convert → write-back cycle.
///
/// Create with [`Coordinator::new`], then spawn [`run`](Self::run) as a
/// tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use formula_clip::clipboard::ArboardClipboard;
/// use formula_clip::config::{new_shared_config, AppConfig};
/// use formula_clip::notify::LogPresenter;
/// use formula_clip::ocr::Dispatcher;
/// use formula_clip::pipeline::Coordinator;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let dispatcher = Arc::new(Dispatcher::from_config(&config));
/// let (coordinator, handle) = Coordinator::new(
///     new_shared_config(config),
///     dispatcher,
///     Arc::new(ArboardClipboard::new()),
///     Arc::new(LogPresenter),
/// );
/// let task = tokio::spawn(coordinator.run());
/// // ...
/// handle.shutdown().await.ok();
/// task.await.ok();
/// # }
/// ```
pub struct Coordinator {
    config: SharedConfig,
    dispatcher: Arc<Dispatcher>,
    clipboard: Arc<dyn ClipboardSource>,
    presenter: Arc<dyn Presenter>,
    watcher: ClipboardWatcher,
    events: mpsc::UnboundedReceiver<ClipboardEvent>,
    commands: mpsc::Receiver<PipelineCommand>,
    state: PipelineState,
    status: SharedStatus,
}

impl Coordinator {
    /// Create a coordinator and the handle used to command it.  Nothing is
    /// watched until [`run`](Self::run) is polled.
    pub fn new(
        config: SharedConfig,
        dispatcher: Arc<Dispatcher>,
        clipboard: Arc<dyn ClipboardSource>,
        presenter: Arc<dyn Presenter>,
    ) -> (Self, CoordinatorHandle) {
        let interval = read_settings(&config).polling_interval();
        let (watcher, events) = ClipboardWatcher::new(Arc::clone(&clipboard), interval);
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);

        let coordinator = Self {
            config,
            dispatcher,
            clipboard,
            presenter,
            watcher,
            events,
            commands,
            state: PipelineState::Idle,
            status: new_shared_status(),
        };
        (coordinator, CoordinatorHandle { commands: tx })
    }

    /// Shared, eventually consistent view of the pipeline.
    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until a [`PipelineCommand::Shutdown`] arrives or every handle is
    /// dropped.
    pub async fn run(mut self) {
        let settings = self.settings();
        self.update_status(|st| st.enabled = settings.enabled);
        if settings.enabled {
            self.watcher.start();
        } else {
            log::info!("pipeline: conversion disabled, not watching");
        }
        self.sync_watching();

        let mut conversion: Option<Conversion> = None;
        let mut resume: Option<Pin<Box<Sleep>>> = None;
        let mut shutting_down = false;

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.handle_event(event, &mut conversion);
                }
                result = join_conversion(&mut conversion) => {
                    self.settle(result);
                    if shutting_down {
                        break;
                    }
                    resume = Some(Box::pin(tokio::time::sleep(self.settings().resume_delay())));
                }
                () = wait_resume(&mut resume) => {
                    resume = None;
                    self.resume();
                }
                command = self.commands.recv(), if !shutting_down => match command {
                    Some(PipelineCommand::Reload) => self.reload(),
                    Some(PipelineCommand::Shutdown) | None => {
                        log::info!("pipeline: shutting down");
                        self.watcher.stop();
                        self.sync_watching();
                        if conversion.is_none() {
                            break;
                        }
                        shutting_down = true;
                    }
                },
            }
        }

        log::info!("pipeline: coordinator stopped");
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: ClipboardEvent, conversion: &mut Option<Conversion>) {
        let image = match event {
            ClipboardEvent::Image(image) => image,
            ClipboardEvent::ChangedWithoutImage => {
                log::trace!("pipeline: clipboard change without image ignored");
                return;
            }
        };

        if self.state != PipelineState::Idle || conversion.is_some() {
            log::debug!(
                "pipeline: {} while {}, dropping image",
                describe(&image),
                self.state.label()
            );
            return;
        }

        log::info!(
            "pipeline: converting {} with {} backend",
            describe(&image),
            self.dispatcher.backend_name()
        );
        self.set_state(PipelineState::Converting);

        let dispatcher = Arc::clone(&self.dispatcher);
        *conversion = Some(tokio::spawn(
            async move { dispatcher.convert(&image).await },
        ));
    }

    /// Stop watching, then deliver the outcome.
    fn settle(&mut self, result: Result<String, OcrError>) {
        self.watcher.stop();
        let stale = self.drain_events();
        if stale > 0 {
            log::debug!("pipeline: discarded {stale} event(s) raised during conversion");
        }
        self.set_state(PipelineState::Suspended);
        self.sync_watching();

        match result {
            Ok(formula) => match self.clipboard.write_text(&formula) {
                Ok(()) => {
                    log::info!("pipeline: wrote {} chars of LaTeX", formula.chars().count());
                    self.update_status(|st| {
                        st.last_formula = Some(formula.clone());
                        st.last_error = None;
                        st.conversions += 1;
                    });
                    self.presenter.notify_success(&formula);
                }
                Err(e) => {
                    log::error!("pipeline: {e}");
                    self.update_status(|st| st.last_error = Some(e.to_string()));
                    self.presenter.notify_write_failed(&e);
                }
            },
            Err(err) => {
                log::warn!("pipeline: conversion failed: {err}");
                self.update_status(|st| st.last_error = Some(err.to_string()));
                present_failure(self.presenter.as_ref(), &err);
            }
        }
    }

    /// End of the suspension window.
    fn resume(&mut self) {
        let settings = self.settings();
        self.set_state(PipelineState::Idle);
        self.update_status(|st| st.enabled = settings.enabled);

        if settings.enabled {
            self.watcher.set_interval(settings.polling_interval());
            self.watcher.start();
        } else {
            log::info!("pipeline: conversion disabled, not resuming watcher");
        }
        self.sync_watching();
    }

    fn reload(&mut self) {
        let settings = self.settings();
        log::info!("pipeline: reloading settings");

        self.dispatcher.apply_config(&settings);
        self.watcher.set_interval(settings.polling_interval());
        self.update_status(|st| st.enabled = settings.enabled);

        // Outside Idle the watcher is re-armed by `resume`.
        if self.state == PipelineState::Idle {
            if settings.enabled {
                self.watcher.start();
            } else {
                self.watcher.stop();
            }
        }
        self.sync_watching();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn settings(&self) -> AppConfig {
        read_settings(&self.config)
    }

    fn drain_events(&mut self) -> usize {
        let mut count = 0;
        while self.events.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
        self.update_status(|st| st.state = state);
    }

    fn sync_watching(&self) {
        let watching = self.watcher.is_running();
        self.update_status(|st| st.watching = watching);
    }

    fn update_status(&self, f: impl FnOnce(&mut PipelineStatus)) {
        let mut st = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut st);
    }
}

fn read_settings(config: &SharedConfig) -> AppConfig {
    config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn describe(image: &ClipImage) -> String {
    format!("{}x{} image", image.width, image.height)
}

/// Resolves when the in-flight conversion settles; pends forever when there
/// is none.
async fn join_conversion(slot: &mut Option<Conversion>) -> Result<String, OcrError> {
    let Some(handle) = slot.as_mut() else {
        return future::pending().await;
    };
    let joined = handle.await;
    *slot = None;
    joined.unwrap_or_else(|e| {
        Err(OcrError::Backend {
            code: -1,
            message: format!("conversion task failed: {e}"),
        })
    })
}

async fn wait_resume(resume: &mut Option<Pin<Box<Sleep>>>) {
    match resume.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
