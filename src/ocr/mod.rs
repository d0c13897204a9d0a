//! OCR backends for formula-clip.
//!
//! This module provides:
//! * [`FormulaBackend`]: async trait implemented by every backend.
//! * [`LocalOcr`]: pix2tex run through a local Python interpreter.
//! * [`MultipartOcr`]: multipart-upload OCR service.
//! * [`VisionOcr`]: JSON vision-model OCR service.
//! * [`Dispatcher`]: holds the active backend and hot-swaps it.
//! * [`OcrError`]: the shared failure taxonomy.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use formula_clip::clipboard::ClipImage;
//! use formula_clip::config::AppConfig;
//! use formula_clip::ocr::Dispatcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::from_config(&AppConfig::default());
//!     let image = ClipImage::open("formula.png").expect("not an image");
//!     match dispatcher.convert(&image).await {
//!         Ok(latex) => println!("{latex}"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod local;
pub mod multipart;
pub mod vision;

#[cfg(test)]
pub(crate) mod test_server;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::FormulaBackend;
pub use dispatcher::Dispatcher;
pub use error::{finish_formula, OcrError};
pub use local::LocalOcr;
pub use multipart::MultipartOcr;
pub use vision::VisionOcr;

#[cfg(test)]
pub use backend::MockBackend;
