//! Configuration module for formula-clip.
//!
//! Provides `AppConfig` (top-level settings), per-backend sub-configs,
//! `AppPaths` for the platform config directory, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    new_shared_config, AppConfig, BackendKind, LocalConfig, MultipartConfig, SharedConfig,
    VisionConfig,
};
