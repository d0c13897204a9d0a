//! Core `FormulaBackend` trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clipboard::ClipImage;
use crate::ocr::OcrError;

/// Async trait for image-to-formula conversion.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. held by the [`Dispatcher`](crate::ocr::Dispatcher) and cloned into
/// a conversion task).  Every failure is already classified as an
/// [`OcrError`] when it leaves `convert`.
#[async_trait]
pub trait FormulaBackend: Send + Sync {
    /// Short name used in logs and credential errors.
    fn name(&self) -> &'static str;

    /// Convert one image to trimmed, non-empty formula text.
    async fn convert(&self, image: &ClipImage) -> Result<String, OcrError>;
}

#[async_trait]
impl<T: FormulaBackend + ?Sized> FormulaBackend for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn convert(&self, image: &ClipImage) -> Result<String, OcrError> {
        (**self).convert(image).await
    }
}

// Compile-time assertion: Box<dyn FormulaBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn FormulaBackend>) {}
};

// ---------------------------------------------------------------------------
// MockBackend (tests only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockBackend;
