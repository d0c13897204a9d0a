//! Application entry point: formula-clip.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging.
//! 3. Load [`AppConfig`] from disk (default on first run) and apply CLI
//!    overrides.
//! 4. Create the [`tokio`] runtime.
//! 5. Build the dispatcher, clipboard and presenter, then spawn the
//!    pipeline coordinator.
//! 6. Wait for Ctrl-C.  On unix, SIGHUP re-reads `settings.toml`.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use anyhow::{Context, Result};
use clap::Parser;

use formula_clip::{
    clipboard::ArboardClipboard,
    config::{new_shared_config, AppConfig, AppPaths, BackendKind, SharedConfig},
    notify::LogPresenter,
    ocr::Dispatcher,
    pipeline::{Coordinator, CoordinatorHandle},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Watch the clipboard and replace copied formula images with LaTeX.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Settings file (default: <config dir>/formula-clip/settings.toml)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// OCR backend to use (local, multipart-remote, json-remote)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Clipboard polling interval in seconds
    #[arg(short, long)]
    interval: Option<f64>,

    /// Save the effective settings and exit
    #[arg(long)]
    write_config: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn settings_file(&self) -> PathBuf {
        AppPaths::resolve(self.config.as_deref()).settings_file
    }

    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Settings from disk with command-line overrides applied.
    fn load_config(&self) -> Result<AppConfig> {
        let path = self.settings_file();
        let mut config = AppConfig::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(interval) = self.interval {
            config.polling_interval_secs = interval;
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    // 2. Configuration
    let config = args.load_config().unwrap_or_else(|e| {
        log::warn!("{e:#}; using defaults");
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        config
    });

    if args.write_config {
        let path = args.settings_file();
        config
            .save_to(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    log::info!(
        "formula-clip starting up ({} backend, polling every {:?})",
        config.backend,
        config.polling_interval()
    );

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(args, config))
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    // 4. Collaborators
    let dispatcher = Arc::new(Dispatcher::from_config(&config));
    let shared = new_shared_config(config);
    let (coordinator, handle) = Coordinator::new(
        Arc::clone(&shared),
        dispatcher,
        Arc::new(ArboardClipboard::new()),
        Arc::new(LogPresenter),
    );

    // 5. Pipeline
    let pipeline = tokio::spawn(coordinator.run());

    // 6. Signals
    let waited = wait_for_signals(&args, &shared, &handle).await;

    handle.shutdown().await.ok();
    pipeline.await.context("pipeline task failed")?;
    waited
}

#[cfg(unix)]
async fn wait_for_signals(
    args: &Args,
    config: &SharedConfig,
    handle: &CoordinatorHandle,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                log::info!("Ctrl-C received, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => reload(args, config, handle).await,
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(
    _args: &Args,
    _config: &SharedConfig,
    _handle: &CoordinatorHandle,
) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log::info!("Ctrl-C received, shutting down");
    Ok(())
}

/// Re-read the settings file into `config` and tell the coordinator.
#[cfg_attr(not(unix), allow(dead_code))]
async fn reload(args: &Args, config: &SharedConfig, handle: &CoordinatorHandle) {
    match args.load_config() {
        Ok(fresh) => {
            *config.write().unwrap_or_else(PoisonError::into_inner) = fresh;
            if handle.reload().await.is_err() {
                log::warn!("Settings reloaded but the pipeline has already stopped");
            }
        }
        Err(e) => log::warn!("Keeping current settings: {e:#}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let args = Args::parse_from([
            "formula-clip",
            "--backend",
            "multipart-remote",
            "--interval",
            "1.5",
        ]);
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.backend, BackendKind::MultipartRemote);
        assert!((config.polling_interval_secs - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn verbosity_raises_log_filter() {
        assert_eq!(Args::parse_from(["formula-clip"]).log_filter(), "info");
        assert_eq!(Args::parse_from(["formula-clip", "-v"]).log_filter(), "debug");
        assert_eq!(Args::parse_from(["formula-clip", "-vv"]).log_filter(), "trace");
    }

    #[test]
    fn load_config_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "backend = \"local\"\nenabled = false\n").unwrap();

        let args = Args::parse_from([
            "formula-clip",
            "--config",
            path.to_str().unwrap(),
            "-i",
            "2",
        ]);
        let config = args.load_config().unwrap();

        assert_eq!(config.backend, BackendKind::Local);
        assert!(!config.enabled);
        assert!((config.polling_interval_secs - 2.0).abs() < f64::EPSILON);
    }
}
