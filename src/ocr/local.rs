//! Local pix2tex backend: runs a Python interpreter against a temp PNG.
//!
//! The interpreter is probed once at construction.  When none of the
//! candidates exist every conversion fails fast with
//! [`OcrError::RuntimeMissing`] without touching the filesystem.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::clipboard::ClipImage;
use crate::config::LocalConfig;
use crate::ocr::{finish_formula, FormulaBackend, OcrError};

/// Recognition script passed via `-c`; the image path arrives as `argv[1]`.
const RECOGNIZE_SCRIPT: &str = "\
import sys
sys.stdout.reconfigure(encoding='utf-8')
from PIL import Image
from pix2tex.cli import LatexOCR
model = LatexOCR()
print(model(Image.open(sys.argv[1])))
";

/// Runs pix2tex in a child Python process.
#[derive(Debug, Clone)]
pub struct LocalOcr {
    interpreter: Option<PathBuf>,
    timeout: Duration,
}

impl LocalOcr {
    pub fn from_config(config: &LocalConfig) -> Self {
        Self::probe(
            &config.interpreter_candidates,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Pick the first candidate that exists as a file.
    pub fn probe(candidates: &[PathBuf], timeout: Duration) -> Self {
        let interpreter = candidates.iter().find(|p| p.is_file()).cloned();
        match &interpreter {
            Some(path) => log::info!("local-ocr: using interpreter {}", path.display()),
            None => log::warn!(
                "local-ocr: no interpreter found among {} candidates",
                candidates.len()
            ),
        }
        Self {
            interpreter,
            timeout,
        }
    }

    /// The interpreter chosen at construction, if any.
    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    async fn run(&self, interpreter: &Path, image_path: &Path) -> Result<Output, OcrError> {
        let child = Command::new(interpreter)
            .arg("-c")
            .arg(RECOGNIZE_SCRIPT)
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::Backend {
                code: -1,
                message: format!("failed to run {}: {e}", interpreter.display()),
            })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(OcrError::Backend {
                code: -1,
                message: format!("failed to collect recognizer output: {e}"),
            }),
            Err(_) => {
                log::warn!("local-ocr: recognizer exceeded {:?}", self.timeout);
                Err(OcrError::Timeout)
            }
        }
    }
}

#[async_trait]
impl FormulaBackend for LocalOcr {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn convert(&self, image: &ClipImage) -> Result<String, OcrError> {
        let interpreter = self.interpreter.as_deref().ok_or(OcrError::RuntimeMissing)?;
        let png = image.to_png()?;

        // Removed from disk when `temp` drops, whatever the outcome.
        let mut temp = tempfile::Builder::new()
            .prefix("formula-clip-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::ImageEncodingFailed(e.to_string()))?;
        temp.write_all(&png)
            .and_then(|()| temp.flush())
            .map_err(|e| OcrError::ImageEncodingFailed(e.to_string()))?;

        log::debug!("local-ocr: running recognizer on {}", temp.path().display());
        let output = self.run(interpreter, temp.path()).await?;
        classify_output(&output)
    }
}

/// Map a finished recognizer process onto a formula or an [`OcrError`].
fn classify_output(output: &Output) -> Result<String, OcrError> {
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        log::warn!("local-ocr: recognizer failed: {}", stderr.trim());
        if names_missing_module(&stderr) {
            let detail = stderr
                .lines()
                .rev()
                .find(|l| l.contains("No module named"))
                .unwrap_or("No module named pix2tex")
                .trim()
                .to_string();
            return Err(OcrError::DependencyMissing(detail));
        }
        return Err(OcrError::Backend {
            code: output.status.code().unwrap_or(-1),
            message: stderr.trim().to_string(),
        });
    }

    let stdout = std::str::from_utf8(&output.stdout).map_err(|_| {
        OcrError::ResponseUnparseable("recognizer output is not valid UTF-8".into())
    })?;
    finish_formula(stdout)
}

fn names_missing_module(stderr: &str) -> bool {
    stderr.contains("No module named") && (stderr.contains("pix2tex") || stderr.contains("PIL"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
