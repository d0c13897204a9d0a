//! Conversion dispatcher: owns the single active backend.
//!
//! The active backend lives in an [`ArcSwap`].  `convert` takes its own
//! `Arc` of the backend before awaiting, so swapping only affects calls that
//! start afterwards; a conversion already running finishes against the
//! backend it started with.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::clipboard::ClipImage;
use crate::config::{AppConfig, BackendKind, LocalConfig, MultipartConfig, VisionConfig};
use crate::ocr::{FormulaBackend, LocalOcr, MultipartOcr, OcrError, VisionOcr};

/// Everything that determines how a backend is built.  Two equal specs
/// produce interchangeable backends.
#[derive(Debug, Clone, PartialEq)]
enum BackendSpec {
    Local(LocalConfig),
    Multipart(MultipartConfig, Option<String>),
    Vision(VisionConfig, Option<String>),
}

impl BackendSpec {
    fn from_config(config: &AppConfig) -> Self {
        let credential = config.credential(config.backend);
        match config.backend {
            BackendKind::Local => BackendSpec::Local(config.local.clone()),
            BackendKind::MultipartRemote => {
                BackendSpec::Multipart(config.multipart.clone(), credential)
            }
            BackendKind::JsonRemote => BackendSpec::Vision(config.vision.clone(), credential),
        }
    }

    fn build(&self) -> Box<dyn FormulaBackend> {
        match self {
            BackendSpec::Local(local) => Box::new(LocalOcr::from_config(local)),
            BackendSpec::Multipart(multipart, token) => Box::new(MultipartOcr::new(
                multipart.endpoint.clone(),
                token.clone(),
                Duration::from_secs(multipart.timeout_secs),
            )),
            BackendSpec::Vision(vision, api_key) => {
                Box::new(VisionOcr::from_config(vision, api_key.clone()))
            }
        }
    }
}

struct Active {
    backend: Box<dyn FormulaBackend>,
    spec: Option<BackendSpec>,
}

/// Routes conversions to the currently selected backend.
pub struct Dispatcher {
    active: ArcSwap<Active>,
}

impl Dispatcher {
    /// Wrap an already-built backend.
    pub fn new(backend: impl FormulaBackend + 'static) -> Self {
        Self {
            active: ArcSwap::from_pointee(Active {
                backend: Box::new(backend),
                spec: None,
            }),
        }
    }

    /// Build the backend selected in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let spec = BackendSpec::from_config(config);
        log::info!("dispatcher: selected {} backend", config.backend);
        Self {
            active: ArcSwap::from_pointee(Active {
                backend: spec.build(),
                spec: Some(spec),
            }),
        }
    }

    /// Replace the active backend.  Takes effect for the next `convert`.
    pub fn swap(&self, backend: impl FormulaBackend + 'static) {
        log::info!("dispatcher: switching to {} backend", backend.name());
        self.active.store(Arc::new(Active {
            backend: Box::new(backend),
            spec: None,
        }));
    }

    /// Rebuild the backend if `config` selects a different one (or changes
    /// its endpoint, credentials or limits).  Returns `true` when swapped.
    pub fn apply_config(&self, config: &AppConfig) -> bool {
        let spec = BackendSpec::from_config(config);
        if self.active.load().spec.as_ref() == Some(&spec) {
            return false;
        }
        log::info!("dispatcher: switching to {} backend", config.backend);
        self.active.store(Arc::new(Active {
            backend: spec.build(),
            spec: Some(spec),
        }));
        true
    }

    /// Name of the backend the next conversion will use.
    pub fn backend_name(&self) -> &'static str {
        self.active.load().backend.name()
    }

    /// Convert `image` with the active backend.  Errors pass through
    /// exactly as the backend classified them.
    pub async fn convert(&self, image: &ClipImage) -> Result<String, OcrError> {
        let active = self.active.load_full();
        active.backend.convert(image).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
