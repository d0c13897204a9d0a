//! Multipart-upload OCR service backend (SimpleTex-compatible).
//!
//! One POST per image: a single `file` part holding the PNG, authenticated
//! by a `token` header.  The formula is read from `res.latex`, falling back
//! to a top-level `latex`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

use crate::clipboard::ClipImage;
use crate::ocr::{finish_formula, FormulaBackend, OcrError};

pub struct MultipartOcr {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl MultipartOcr {
    /// Build a client for `endpoint`.  A missing `token` is reported on the
    /// first conversion, not here.
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl FormulaBackend for MultipartOcr {
    fn name(&self) -> &'static str {
        "multipart-remote"
    }

    async fn convert(&self, image: &ClipImage) -> Result<String, OcrError> {
        let token = self.token.as_deref().ok_or(OcrError::CredentialsMissing {
            backend: self.name(),
        })?;

        let png = image.to_png()?;
        let part = Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| OcrError::ImageEncodingFailed(e.to_string()))?;
        let form = Form::new().part("file", part);

        log::info!(
            "multipart-ocr: uploading {}x{} image",
            image.width,
            image.height
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("token", token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        log::debug!("multipart-ocr: response status {status}");

        if status != StatusCode::OK {
            return Err(OcrError::Backend {
                code: i32::from(status.as_u16()),
                message: body,
            });
        }

        parse_formula(&body)
    }
}

/// Pull the formula out of a success body.
fn parse_formula(body: &str) -> Result<String, OcrError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| OcrError::ResponseUnparseable(format!("invalid JSON: {e}")))?;

    let raw = json
        .pointer("/res/latex")
        .and_then(Value::as_str)
        .or_else(|| json.get("latex").and_then(Value::as_str))
        .ok_or_else(|| {
            log::warn!("multipart-ocr: unexpected response: {body}");
            OcrError::ResponseUnparseable("no `res.latex` or `latex` field".into())
        })?;

    finish_formula(raw)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
