//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing keys fall back to their defaults, so a hand-written
//! `settings.toml` only needs the fields the user wants to change.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Polling interval used when the configured one is missing or non-positive.
const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for the polling interval.
const MAX_POLLING_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Upper bound for the resume delay.
const MAX_RESUME_DELAY: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// Selects which OCR backend converts clipboard images.
///
/// | Variant          | Backend                                     | Credential   |
/// |------------------|---------------------------------------------|--------------|
/// | Local            | pix2tex run by a local Python interpreter   | none         |
/// | MultipartRemote  | SimpleTex-style multipart upload            | access token |
/// | JsonRemote       | Anthropic-style JSON vision request         | API key      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Local,
    MultipartRemote,
    JsonRemote,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::JsonRemote
    }
}

impl BackendKind {
    /// Name used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::MultipartRemote => "multipart-remote",
            BackendKind::JsonRemote => "json-remote",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(BackendKind::Local),
            "multipart-remote" => Ok(BackendKind::MultipartRemote),
            "json-remote" => Ok(BackendKind::JsonRemote),
            other => Err(format!(
                "unknown backend `{other}` (expected local, multipart-remote or json-remote)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalConfig
// ---------------------------------------------------------------------------

/// Settings for the local pix2tex process backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Interpreter locations probed in order; the first existing one wins.
    pub interpreter_candidates: Vec<PathBuf>,
    /// Seconds before a running recognition process is killed.
    pub timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            interpreter_candidates: vec![
                PathBuf::from("/opt/homebrew/bin/python3"),
                PathBuf::from("/usr/local/bin/python3"),
                PathBuf::from("/usr/bin/python3"),
            ],
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// MultipartConfig
// ---------------------------------------------------------------------------

/// Settings for the multipart-upload OCR service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Upload endpoint.
    pub endpoint: String,
    /// Access token sent in the `token` header.
    pub token: Option<String>,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://server.simpletex.cn/api/latex_ocr_turbo".into(),
            token: None,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// VisionConfig
// ---------------------------------------------------------------------------

/// Settings for the JSON vision-model OCR service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Messages endpoint.
    pub endpoint: String,
    /// API key sent in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Model identifier placed in the request body.
    pub model: String,
    /// `max_tokens` placed in the request body.
    pub max_tokens: u32,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            api_key: None,
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 1024,
            api_version: "2023-06-01".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use formula_clip::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Whether clipboard images are converted at all.
    pub enabled: bool,
    /// Seconds between clipboard polls.
    pub polling_interval_secs: f64,
    /// Seconds the watcher stays suspended after a conversion settles.
    pub resume_delay_secs: f64,
    /// Active OCR backend.
    pub backend: BackendKind,
    /// Local pix2tex settings.
    pub local: LocalConfig,
    /// Multipart-upload service settings.
    pub multipart: MultipartConfig,
    /// Vision-model service settings.
    pub vision: VisionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_secs: DEFAULT_POLLING_INTERVAL.as_secs_f64(),
            resume_delay_secs: 0.5,
            backend: BackendKind::default(),
            local: LocalConfig::default(),
            multipart: MultipartConfig::default(),
            vision: VisionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clipboard polling interval.  Non-positive or non-finite values fall
    /// back to 0.5 s; values above one hour are capped.
    pub fn polling_interval(&self) -> Duration {
        positive_secs(self.polling_interval_secs, MAX_POLLING_INTERVAL)
            .unwrap_or(DEFAULT_POLLING_INTERVAL)
    }

    /// Suspension delay between a settled conversion and re-arming the
    /// watcher.  Negative or non-finite values mean no delay; values above
    /// one minute are capped.
    pub fn resume_delay(&self) -> Duration {
        positive_secs(self.resume_delay_secs, MAX_RESUME_DELAY).unwrap_or(Duration::ZERO)
    }

    /// The configured secret for `kind`.  Empty strings count as absent.
    pub fn credential(&self, kind: BackendKind) -> Option<String> {
        let raw = match kind {
            BackendKind::Local => None,
            BackendKind::MultipartRemote => self.multipart.token.as_deref(),
            BackendKind::JsonRemote => self.vision.api_key.as_deref(),
        };
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// `secs` as a [`Duration`] no longer than `max`, or `None` when it is not a
/// positive finite number.
fn positive_secs(secs: f64, max: Duration) -> Option<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).map_or(max, |d| d.min(max)))
}

// ---------------------------------------------------------------------------
// SharedConfig
// ---------------------------------------------------------------------------

/// Runtime settings shared between the settings owner and the pipeline.
///
/// The pipeline only ever takes read locks; whoever edits the settings sends
/// a reload command afterwards.
pub type SharedConfig = Arc<RwLock<AppConfig>>;

/// Wrap `config` in a [`SharedConfig`].
pub fn new_shared_config(config: AppConfig) -> SharedConfig {
    Arc::new(RwLock::new(config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
