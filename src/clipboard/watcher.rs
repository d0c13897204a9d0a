//! Polling clipboard watcher.
//!
//! [`ClipboardWatcher`] spawns a tokio task that reads the clipboard's change
//! counter every `interval`.  When the counter moves it extracts an image
//! (direct image payload first, then the first file reference that decodes)
//! and sends exactly one [`ClipboardEvent`] for that change.
//!
//! # Start / stop
//!
//! Both are idempotent.  `start()` takes the current counter as its
//! baseline, so whatever is on the clipboard when watching (re)starts is
//! never reported.  After `stop()` returns no further event is sent: each
//! tick polls on the blocking pool, then holds the run gate while it sends,
//! and `stop()` closes the gate before aborting the task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{ClipImage, ClipboardSource};

/// One detected clipboard change.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardEvent {
    /// The new contents carry an image.
    Image(ClipImage),
    /// The contents changed but hold no usable image.
    ChangedWithoutImage,
}

impl ClipboardEvent {
    pub fn has_image(&self) -> bool {
        matches!(self, ClipboardEvent::Image(_))
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Per-run polling state.
struct Poller {
    source: Arc<dyn ClipboardSource>,
    last_seen: u64,
}

impl Poller {
    fn baseline(source: Arc<dyn ClipboardSource>) -> Self {
        let last_seen = source.change_counter();
        Self { source, last_seen }
    }

    /// One tick.  Only compares and reads; never blocks on anything but the
    /// clipboard itself.
    fn poll(&mut self) -> Option<ClipboardEvent> {
        let current = self.source.change_counter();
        if current == self.last_seen {
            return None;
        }
        self.last_seen = current;

        Some(match extract_image(self.source.as_ref()) {
            Some(image) => ClipboardEvent::Image(image),
            None => ClipboardEvent::ChangedWithoutImage,
        })
    }
}

fn extract_image(source: &dyn ClipboardSource) -> Option<ClipImage> {
    if let Some(image) = source.read_image().filter(ClipImage::is_valid) {
        return Some(image);
    }
    source
        .read_file_references()
        .iter()
        .find_map(ClipImage::open)
}

// ---------------------------------------------------------------------------
// ClipboardWatcher
// ---------------------------------------------------------------------------

struct Running {
    /// `true` while ticks may send.  Each run gets a fresh gate.
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Emits [`ClipboardEvent`]s for clipboard changes while started.
pub struct ClipboardWatcher {
    source: Arc<dyn ClipboardSource>,
    interval: Duration,
    events: mpsc::UnboundedSender<ClipboardEvent>,
    running: Option<Running>,
}

impl ClipboardWatcher {
    /// Create a stopped watcher and the receiving end of its event channel.
    pub fn new(
        source: Arc<dyn ClipboardSource>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ClipboardEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            source,
            interval,
            events,
            running: None,
        };
        (watcher, rx)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin polling.  No-op when already running.  Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let mut poller = Poller::baseline(Arc::clone(&self.source));
        let gate = Arc::new(Mutex::new(true));
        let tick_gate = Arc::clone(&gate);
        let events = self.events.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the baseline covers it.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                // Fingerprinting a large image is slow; keep it off the
                // runtime's worker threads.
                let polled = tokio::task::spawn_blocking(move || {
                    let event = poller.poll();
                    (poller, event)
                })
                .await;
                let Ok((returned, event)) = polled else {
                    break;
                };
                poller = returned;
                let Some(event) = event else {
                    continue;
                };

                let sent = {
                    let open = tick_gate.lock().unwrap_or_else(|p| p.into_inner());
                    *open && {
                        log::debug!("watcher: clipboard changed (image: {})", event.has_image());
                        events.send(event).is_ok()
                    }
                };
                if !sent {
                    break;
                }
            }
        });

        log::info!("watcher: started ({:?} interval)", self.interval);
        self.running = Some(Running { gate, task });
    }

    /// Stop polling.  No-op when already stopped.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            *running.gate.lock().unwrap_or_else(|p| p.into_inner()) = false;
            running.task.abort();
            log::info!("watcher: stopped");
        }
    }

    /// Change the polling interval, restarting the poll loop if running.
    pub fn set_interval(&mut self, interval: Duration) {
        if interval == self.interval {
            return;
        }
        self.interval = interval;
        if self.is_running() {
            self.stop();
            self.start();
        }
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::image::sample_image;
    use crate::clipboard::MockClipboard;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;
    use tokio::sync::mpsc::error::TryRecvError;

    const TICK: Duration = Duration::from_millis(500);

    fn watcher() -> (
        Arc<MockClipboard>,
        ClipboardWatcher,
        mpsc::UnboundedReceiver<ClipboardEvent>,
    ) {
        let clipboard = Arc::new(MockClipboard::new());
        let (watcher, rx) = ClipboardWatcher::new(clipboard.clone(), TICK);
        (clipboard, watcher, rx)
    }

    /// Sleep across `n` poll ticks (plus slack so the tick has run).
    async fn ticks(n: u32) {
        tokio::time::sleep(TICK * n + Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_clipboard_emits_nothing() {
        let (_clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        ticks(3).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn copied_image_is_emitted_once() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_image(sample_image());
        ticks(3).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::Image(sample_image())));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn text_change_is_reported_without_image() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_text("E = mc^2");
        ticks(1).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::ChangedWithoutImage));
    }

    #[tokio::test(start_paused = true)]
    async fn several_changes_between_ticks_give_one_event() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_text("a");
        clipboard.copy_text("b");
        clipboard.copy_image(sample_image());
        ticks(1).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::Image(sample_image())));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn first_decodable_file_reference_is_used() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        let shot = dir.path().join("shot.png");
        std::fs::write(&notes, "not an image").unwrap();
        std::fs::write(&shot, sample_image().to_png().unwrap()).unwrap();

        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_files(vec![notes, shot]);
        ticks(1).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::Image(sample_image())));
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_files_count_as_no_image() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "still not an image").unwrap();

        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_files(vec![notes]);
        ticks(1).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::ChangedWithoutImage));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sized_image_counts_as_no_image() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();

        clipboard.copy_image(ClipImage::new(0, 0, Vec::new()));
        ticks(1).await;

        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::ChangedWithoutImage));
    }

    #[tokio::test(start_paused = true)]
    async fn content_present_at_start_is_not_reported() {
        let (clipboard, mut watcher, mut rx) = watcher();
        clipboard.copy_image(sample_image());

        watcher.start();
        ticks(3).await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn no_events_after_stop() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();
        ticks(1).await;

        watcher.stop();
        assert!(!watcher.is_running());

        clipboard.copy_image(sample_image());
        ticks(4).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rebaselines_then_reports_new_changes() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();
        watcher.stop();

        clipboard.copy_text("written while stopped");
        watcher.start();
        ticks(2).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        clipboard.copy_image(sample_image());
        ticks(1).await;
        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::Image(sample_image())));
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();
        watcher.start();
        assert!(watcher.is_running());

        clipboard.copy_image(sample_image());
        ticks(2).await;

        // A second poll loop would have produced a duplicate.
        assert!(rx.try_recv().is_ok());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        watcher.stop();
        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn set_interval_restarts_running_loop() {
        let (clipboard, mut watcher, mut rx) = watcher();
        watcher.start();
        watcher.set_interval(Duration::from_secs(2));
        assert!(watcher.is_running());
        assert_eq!(watcher.interval(), Duration::from_secs(2));

        clipboard.copy_text("x");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(rx.try_recv(), Ok(ClipboardEvent::ChangedWithoutImage));
    }

    /// Counter reads block while `hold` is set, until the test releases them.
    struct HeldClipboard {
        inner: MockClipboard,
        hold: AtomicBool,
        entered: AtomicBool,
        release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl ClipboardSource for HeldClipboard {
        fn change_counter(&self) -> u64 {
            if self.hold.load(Ordering::SeqCst) {
                self.entered.store(true, Ordering::SeqCst);
                if let Some(released) = self.release.lock().unwrap().take() {
                    let _ = released.recv();
                }
            }
            self.inner.change_counter()
        }

        fn read_image(&self) -> Option<ClipImage> {
            self.inner.read_image()
        }

        fn read_file_references(&self) -> Vec<std::path::PathBuf> {
            self.inner.read_file_references()
        }

        fn write_text(&self, text: &str) -> Result<(), crate::clipboard::ClipboardError> {
            self.inner.write_text(text)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_in_flight_at_stop_is_discarded() {
        let (release, released) = std::sync::mpsc::channel();
        let clipboard = Arc::new(HeldClipboard {
            inner: MockClipboard::new(),
            hold: AtomicBool::new(false),
            entered: AtomicBool::new(false),
            release: Mutex::new(Some(released)),
        });
        let (mut watcher, mut rx) = ClipboardWatcher::new(clipboard.clone(), TICK);
        watcher.start();
        ticks(1).await;

        clipboard.hold.store(true, Ordering::SeqCst);
        clipboard.inner.copy_image(sample_image());
        // The next poll blocks, so step the clock by hand.
        tokio::time::advance(TICK).await;
        while !clipboard.entered.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        watcher.stop();
        release.send(()).unwrap();
        ticks(3).await;

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }
}
