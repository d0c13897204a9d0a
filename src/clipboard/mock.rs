//! In-memory clipboard for tests.

use std::path::PathBuf;
use std::sync::Mutex;

use super::{ClipImage, ClipboardError, ClipboardSource};

#[derive(Default)]
struct MockState {
    counter: u64,
    image: Option<ClipImage>,
    files: Vec<PathBuf>,
    text: Option<String>,
    writes: Vec<String>,
    fail_writes: bool,
}

/// Behaves like a real clipboard: every mutation, including
/// [`write_text`](ClipboardSource::write_text), bumps the change counter.
#[derive(Default)]
pub struct MockClipboard {
    state: Mutex<MockState>,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user copying an image.
    pub fn copy_image(&self, image: ClipImage) {
        let mut st = self.state.lock().unwrap();
        st.counter += 1;
        st.image = Some(image);
        st.files.clear();
        st.text = None;
    }

    /// Simulate the user copying plain text.
    pub fn copy_text(&self, text: &str) {
        let mut st = self.state.lock().unwrap();
        st.counter += 1;
        st.image = None;
        st.files.clear();
        st.text = Some(text.to_string());
    }

    /// Simulate the user copying files in a file manager.
    pub fn copy_files(&self, files: Vec<PathBuf>) {
        let mut st = self.state.lock().unwrap();
        st.counter += 1;
        st.image = None;
        st.files = files;
        st.text = None;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// Every text written through [`ClipboardSource::write_text`].
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn text(&self) -> Option<String> {
        self.state.lock().unwrap().text.clone()
    }
}

impl ClipboardSource for MockClipboard {
    fn change_counter(&self) -> u64 {
        self.state.lock().unwrap().counter
    }

    fn read_image(&self) -> Option<ClipImage> {
        self.state.lock().unwrap().image.clone()
    }

    fn read_file_references(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().files.clone()
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut st = self.state.lock().unwrap();
        if st.fail_writes {
            return Err(ClipboardError::Write("mock write failure".into()));
        }
        st.counter += 1;
        st.image = None;
        st.files.clear();
        st.text = Some(text.to_string());
        st.writes.push(text.to_string());
        Ok(())
    }
}
