//! Command-line arguments and the resolved shell configuration.

use std::path::PathBuf;

use clap::Parser;
use mtpdock_core::UpdateConfig;
use mtpdock_lifecycle::{OrchestratorConfig, WindowOptions};
use mtpdock_profile::{
    BootVerdict, ProfilePaths, Result, RetentionThreshold, Settings, DEFAULT_RETENTION_DAYS,
};

/// MtpDock - MTP file transfer shell
#[derive(Parser, Debug, Clone)]
#[command(name = "mtpdock", version, about)]
pub struct Args {
    /// Use this directory as the profile area instead of the per-user default
    #[arg(long, value_name = "DIR")]
    pub profile_dir: Option<PathBuf>,

    /// Enable debug logging (also logs to stderr)
    #[arg(long)]
    pub debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Create the main window minimized
    #[arg(long, env = "START_MINIMIZED")]
    pub minimized: bool,

    /// Never check for updates
    #[arg(long)]
    pub no_update: bool,

    /// Delete rotated logs older than this many days
    #[arg(long, default_value_t = i64::from(DEFAULT_RETENTION_DAYS))]
    pub retention_days: i64,

    /// Device-transfer engine executable to launch
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,
}

/// Everything the shell needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub paths: ProfilePaths,
    pub retention: RetentionThreshold,
    pub log_level: String,
    /// Mirror logs to stderr.
    pub console_log: bool,
    pub start_minimized: bool,
    /// False when updates were turned off on the command line.
    pub updates_enabled: bool,
    pub update: UpdateConfig,
    pub engine: Option<PathBuf>,
}

impl ShellConfig {
    /// Resolves paths and validates arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let paths = match &args.profile_dir {
            Some(dir) => ProfilePaths::from_root(dir),
            None => ProfilePaths::default_paths()?,
        };
        let retention = RetentionThreshold::from_days(args.retention_days)?;
        let log_level = if args.debug {
            "debug".to_string()
        } else {
            args.log_level.clone()
        };

        Ok(Self {
            paths,
            retention,
            log_level,
            console_log: args.debug,
            start_minimized: args.minimized,
            updates_enabled: !args.no_update,
            update: UpdateConfig::default(),
            engine: args.engine.clone(),
        })
    }

    /// Folds persisted settings into the config.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.update = settings.update_config();
        if !self.updates_enabled {
            self.update.auto_check_enabled = false;
        }
        self
    }

    /// Directory update downloads are written to.
    pub fn download_dir(&self) -> PathBuf {
        self.paths.root.join("updates")
    }

    /// Builds the orchestrator config for this launch.
    pub fn orchestrator_config(&self, verdict: BootVerdict) -> OrchestratorConfig {
        OrchestratorConfig::new(verdict)
            .with_window(WindowOptions {
                start_minimized: self.start_minimized,
            })
            .with_update(self.update)
    }
}
