//! System clipboard backed by the `arboard` crate.
//!
//! Reads open a short-lived [`arboard::Clipboard`] handle per call.  Writes
//! go through a `clipboard-keeper` thread that owns one handle for the life
//! of the [`ArboardClipboard`]: on X11 and Wayland the process must keep a
//! handle alive to go on serving what it wrote, and `arboard::Clipboard` is
//! not `Send` everywhere, so it never leaves that thread.
//!
//! The OS clipboard has no portable change counter, so one is synthesised:
//! each [`change_counter`](ClipboardSource::change_counter) call fingerprints
//! the current text and image with SHA-256 and bumps the counter whenever
//! the fingerprint moves.  Copying byte-identical content twice in a row is
//! therefore not seen as a change.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex, PoisonError};

use arboard::Clipboard;
use sha2::{Digest, Sha256};

use super::{ClipImage, ClipboardError, ClipboardSource};

#[derive(Default)]
struct Fingerprint {
    digest: Option<[u8; 32]>,
    counter: u64,
}

impl Fingerprint {
    /// Fold in a fresh digest and return the counter.  `None` (clipboard
    /// unavailable) and a repeat of the last digest leave it unchanged.
    fn observe(&mut self, digest: Option<[u8; 32]>) -> u64 {
        if digest.is_some() && digest != self.digest {
            self.digest = digest;
            self.counter = self.counter.wrapping_add(1);
        }
        self.counter
    }
}

/// The real system clipboard.
#[derive(Default)]
pub struct ArboardClipboard {
    fingerprint: Mutex<Fingerprint>,
    /// Started by the first write.
    writer: Mutex<Option<WriteKeeper>>,
}

impl ArboardClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSource for ArboardClipboard {
    fn change_counter(&self) -> u64 {
        let digest = current_digest();
        self.fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(digest)
    }

    fn read_image(&self) -> Option<ClipImage> {
        let data = open_clipboard().ok()?.get_image().ok()?;
        let image = ClipImage::new(
            u32::try_from(data.width).ok()?,
            u32::try_from(data.height).ok()?,
            data.bytes.into_owned(),
        );
        image.is_valid().then_some(image)
    }

    fn read_file_references(&self) -> Vec<PathBuf> {
        open_clipboard()
            .ok()
            .and_then(|mut clipboard| clipboard.get_text().ok())
            .map(|text| parse_file_references(&text))
            .unwrap_or_default()
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let keeper = match writer.take() {
            Some(keeper) => keeper,
            None => WriteKeeper::spawn(open_clipboard)?,
        };
        match keeper.write(text) {
            Some(result) => {
                *writer = Some(keeper);
                result
            }
            None => Err(ClipboardError::Write("clipboard thread exited".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// WriteKeeper
// ---------------------------------------------------------------------------

/// Anything that can take ownership of the clipboard text.
trait TextSink {
    fn publish(&mut self, text: &str) -> Result<(), ClipboardError>;
}

impl TextSink for Clipboard {
    fn publish(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

type WriteRequest = (String, mpsc::Sender<Result<(), ClipboardError>>);

/// Dedicated thread owning the handle that published the last write.
///
/// The handle is opened by the first request and kept after every
/// successful write.  A failed write drops it so the next request opens a
/// fresh one.  The thread exits once the keeper is dropped.
struct WriteKeeper {
    requests: mpsc::Sender<WriteRequest>,
}

impl WriteKeeper {
    fn spawn<S, F>(mut open: F) -> Result<Self, ClipboardError>
    where
        S: TextSink + 'static,
        F: FnMut() -> Result<S, ClipboardError> + Send + 'static,
    {
        let (requests, incoming) = mpsc::channel::<WriteRequest>();

        std::thread::Builder::new()
            .name("clipboard-keeper".into())
            .spawn(move || {
                let mut sink: Option<S> = None;
                for (text, reply) in incoming {
                    let handle = match sink.take() {
                        Some(handle) => Ok(handle),
                        None => open(),
                    };
                    let result = handle.and_then(|mut handle| {
                        let published = handle.publish(&text);
                        if published.is_ok() {
                            sink = Some(handle);
                        }
                        published
                    });
                    if let Err(e) = &result {
                        log::warn!("clipboard-keeper: {e}");
                    }
                    let _ = reply.send(result);
                }
                log::debug!("clipboard-keeper: exiting");
            })
            .map_err(|e| ClipboardError::Access(format!("cannot start clipboard thread: {e}")))?;

        Ok(Self { requests })
    }

    /// Hand `text` to the keeper thread and wait for the outcome.  `None`
    /// when the thread is gone.
    fn write(&self, text: &str) -> Option<Result<(), ClipboardError>> {
        let (reply, outcome) = mpsc::channel();
        self.requests.send((text.to_string(), reply)).ok()?;
        outcome.recv().ok()
    }
}

/// SHA-256 over the clipboard's text and image.  `None` when the clipboard
/// cannot be opened, so a transient failure never looks like a change.
fn current_digest() -> Option<[u8; 32]> {
    let mut clipboard = open_clipboard().ok()?;
    let mut hasher = Sha256::new();

    if let Ok(text) = clipboard.get_text() {
        hasher.update(b"text\0");
        hasher.update(text.as_bytes());
    }
    if let Ok(image) = clipboard.get_image() {
        hasher.update(b"image\0");
        hasher.update((image.width as u64).to_le_bytes());
        hasher.update((image.height as u64).to_le_bytes());
        hasher.update(&image.bytes);
    }

    Some(hasher.finalize().into())
}

/// Interpret clipboard text as a list of file references: `file://` URIs or
/// absolute paths to existing files, one per line.
pub fn parse_file_references(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            if line.starts_with("file://") {
                url::Url::parse(line).ok()?.to_file_path().ok()
            } else {
                let path = Path::new(line);
                (path.is_absolute() && path.is_file()).then(|| path.to_path_buf())
            }
        })
        .collect()
}

fn open_clipboard() -> Result<Clipboard, ClipboardError> {
    Clipboard::new().map_err(|e| ClipboardError::Access(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    // ---- Fingerprint ---

    #[test]
    fn counter_moves_only_on_new_digest() {
        let mut fp = Fingerprint::default();
        assert_eq!(fp.observe(None), 0);
        assert_eq!(fp.observe(Some([1; 32])), 1);
        assert_eq!(fp.observe(Some([1; 32])), 1);
        assert_eq!(fp.observe(None), 1);
        assert_eq!(fp.observe(Some([2; 32])), 2);
        // Returning to earlier content is a change again.
        assert_eq!(fp.observe(Some([1; 32])), 3);
    }

    // ---- WriteKeeper ---

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        drops: AtomicUsize,
        published: Mutex<Vec<String>>,
    }

    struct RecordingSink(Arc<Counters>);

    impl TextSink for RecordingSink {
        fn publish(&mut self, text: &str) -> Result<(), ClipboardError> {
            if text == "reject" {
                return Err(ClipboardError::Write("rejected".into()));
            }
            self.0.published.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    impl Drop for RecordingSink {
        fn drop(&mut self) {
            self.0.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn keeper(fail_first_opens: usize) -> (WriteKeeper, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let shared = Arc::clone(&counters);
        let keeper = WriteKeeper::spawn(move || {
            let attempt = shared.opens.fetch_add(1, Ordering::SeqCst);
            if attempt < fail_first_opens {
                return Err(ClipboardError::Access("no display".into()));
            }
            Ok(RecordingSink(Arc::clone(&shared)))
        })
        .unwrap();
        (keeper, counters)
    }

    #[test]
    fn handle_outlives_each_write() {
        let (keeper, counters) = keeper(0);

        assert!(matches!(keeper.write("x^2"), Some(Ok(()))));
        assert!(matches!(keeper.write("y^2"), Some(Ok(()))));

        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.drops.load(Ordering::SeqCst), 0);
        assert_eq!(*counters.published.lock().unwrap(), vec!["x^2", "y^2"]);
    }

    #[test]
    fn failed_open_is_retried_by_next_write() {
        let (keeper, counters) = keeper(1);

        assert!(matches!(
            keeper.write("a"),
            Some(Err(ClipboardError::Access(_)))
        ));
        assert!(matches!(keeper.write("a"), Some(Ok(()))));
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejected_write_reopens_handle() {
        let (keeper, counters) = keeper(0);

        assert!(matches!(
            keeper.write("reject"),
            Some(Err(ClipboardError::Write(_)))
        ));
        assert_eq!(counters.drops.load(Ordering::SeqCst), 1);

        assert!(matches!(keeper.write("b"), Some(Ok(()))));
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(*counters.published.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn no_writer_until_first_write() {
        let clipboard = ArboardClipboard::new();
        assert!(clipboard.writer.lock().unwrap().is_none());
    }

    // ---- parse_file_references ---

    #[cfg(unix)]
    #[test]
    fn file_uris_become_paths() {
        let refs = parse_file_references("file:///tmp/a%20b.png\r\nfile:///tmp/c.jpg\n");
        assert_eq!(
            refs,
            vec![PathBuf::from("/tmp/a b.png"), PathBuf::from("/tmp/c.jpg")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn plain_paths_must_exist() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("shot.png");
        std::fs::write(&existing, b"x").unwrap();
        let text = format!(
            "{}\n{}\nrelative/path.png\n",
            existing.display(),
            dir.path().join("gone.png").display()
        );

        assert_eq!(parse_file_references(&text), vec![existing]);
    }

    #[test]
    fn prose_and_comments_are_ignored() {
        assert!(parse_file_references("E = mc^2\n# file:///tmp/x.png\n\n").is_empty());
        assert!(parse_file_references("https://example.com/x.png").is_empty());
    }
}
