//! Decoded clipboard image payload.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::ocr::OcrError;

/// An RGBA8 image taken from the clipboard.
///
/// Pixel data sits behind an `Arc` so the payload can be handed to a
/// conversion task without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct ClipImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub rgba: Arc<[u8]>,
}

impl std::fmt::Debug for ClipImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

impl ClipImage {
    pub fn new(width: u32, height: u32, rgba: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            rgba: rgba.into(),
        }
    }

    /// Zero-sized images are treated as "no image".
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Decode a raster file into RGBA.  `None` when the file is missing or is
    /// not an image the `image` crate understands.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let decoded = image::open(path.as_ref()).ok()?.to_rgba8();
        let image = Self::new(decoded.width(), decoded.height(), decoded.into_raw());
        image.is_valid().then_some(image)
    }

    /// Encode as PNG (lossless) for the OCR backends.
    pub fn to_png(&self) -> Result<Vec<u8>, OcrError> {
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.rgba.to_vec())
            .ok_or_else(|| {
                OcrError::ImageEncodingFailed(format!(
                    "{} bytes do not match a {}x{} RGBA image",
                    self.rgba.len(),
                    self.width,
                    self.height
                ))
            })?;

        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| OcrError::ImageEncodingFailed(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
pub(crate) fn sample_image() -> ClipImage {
    // 2x2 checkerboard
    let pixels: Vec<u8> = [
        [0u8, 0, 0, 255],
        [255, 255, 255, 255],
        [255, 255, 255, 255],
        [0, 0, 0, 255],
    ]
    .concat();
    ClipImage::new(2, 2, pixels)
}
