//! JSON vision-model OCR backend (Anthropic Messages API wire format).
//!
//! The image travels base64-encoded inside a chat-style payload together
//! with a fixed instruction asking for LaTeX only.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;

use crate::clipboard::ClipImage;
use crate::config::VisionConfig;
use crate::ocr::{finish_formula, FormulaBackend, OcrError};

/// Instruction sent alongside every image.
pub const INSTRUCTION: &str = "Convert this mathematical formula image to LaTeX code. \
Return ONLY the LaTeX code without any explanation, markdown formatting, or additional text. \
If there are multiple formulas, separate them with newlines.";

pub struct VisionOcr {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    api_version: String,
}

impl VisionOcr {
    /// Build from config.  `api_key` is passed separately so the caller
    /// decides what counts as "configured".
    pub fn from_config(config: &VisionConfig, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_version: config.api_version.clone(),
        }
    }

    fn request_body(&self, png: &[u8]) -> Value {
        let data = base64::engine::general_purpose::STANDARD.encode(png);
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": data
                        }
                    },
                    { "type": "text", "text": INSTRUCTION }
                ]
            }]
        })
    }
}

#[async_trait]
impl FormulaBackend for VisionOcr {
    fn name(&self) -> &'static str {
        "json-remote"
    }

    async fn convert(&self, image: &ClipImage) -> Result<String, OcrError> {
        let api_key = self.api_key.as_deref().ok_or(OcrError::CredentialsMissing {
            backend: self.name(),
        })?;

        let body = self.request_body(&image.to_png()?);
        log::info!("vision-ocr: sending request to {}", self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        log::debug!("vision-ocr: response status {status}");

        match status {
            200 => parse_content(&text),
            401 => Err(OcrError::InvalidCredentials),
            429 => Err(OcrError::RateLimited),
            code => Err(OcrError::Backend {
                code: i32::from(code),
                message: error_message(&text),
            }),
        }
    }
}

/// `content[0].text` of a success body.
fn parse_content(body: &str) -> Result<String, OcrError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| OcrError::ResponseUnparseable(format!("invalid JSON: {e}")))?;

    let text = json
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            log::warn!("vision-ocr: unexpected response: {body}");
            OcrError::ResponseUnparseable("could not extract text from response".into())
        })?;

    finish_formula(text)
}

/// Best-effort message from an error body: `error.message`, else the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
