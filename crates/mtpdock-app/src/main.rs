//! MtpDock - desktop shell for MTP file transfer.
//!
//! This binary owns the process lifecycle:
//! - Profile area verification and repair
//! - Single-instance enforcement
//! - Window lifecycle and event relay to the renderer over stdio
//! - Hot-plug monitoring, update checks and log retention

use std::panic;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use mtpdock_app::{
    forward_signals, launch_engine, logging, spawn_retention, updates_supported, Args,
    GitHubUpdater, ShellConfig, StdioHost,
};
use mtpdock_core::DeviceState;
use mtpdock_lifecycle::{
    notify_running_instance, Collaborators, InstanceLock, LifecycleEvent, Orchestrator,
    ProcessEngineSupervisor, UpdateChecker, UsbPollMonitor,
};
use mtpdock_profile::{
    rotate_active_log, BootOutcome, BootVerifier, SettingsStore, DEFAULT_MAX_ACTIVE_LOG_BYTES,
};
use tokio::io::BufReader;

/// Engine executable used when `--engine` is not given. Never launched implicitly.
const DEFAULT_ENGINE_PROGRAM: &str = "mtpdock-engine";

/// How long the runtime waits for stray blocking work (the stdin reader) at exit.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("mtpdock: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    code
}

async fn run(args: Args) -> ExitCode {
    let config = match ShellConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mtpdock: {e}");
            return ExitCode::FAILURE;
        }
    };

    let verifier = BootVerifier::new(config.paths.clone()).with_retention(config.retention);
    let outcome = verifier.boot();

    let lock = if outcome.verdict.is_bootable() {
        match InstanceLock::acquire(&config.paths) {
            Ok(Some(lock)) => Some(lock),
            Ok(None) => {
                // another instance owns the profile; hand over and leave quietly
                if let Err(e) = notify_running_instance(&config.paths).await {
                    eprintln!("mtpdock: could not reach running instance: {e}");
                }
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("mtpdock: failed to take single-instance lock: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let rotated = if outcome.verdict.is_bootable() {
        rotate_active_log(
            &config.paths.log_file,
            DEFAULT_MAX_ACTIVE_LOG_BYTES,
            Local::now().date_naive(),
        )
    } else {
        Ok(None)
    };

    // Initialize logging (keep guard alive for the duration of the program)
    let _log_guard = logging::init_logging(&config);
    install_panic_hook();

    tracing::info!("Starting MtpDock {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Args: {:?}", args);
    log_boot_outcome(&outcome);
    match rotated {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "Rotated active log"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to rotate active log"),
    }

    let code = match start(config, verifier, outcome, lock).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Startup failed: {e:#}");
            1
        }
    };

    tracing::info!(exit_code = code, "MtpDock shutting down");
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Wires collaborators together and runs the lifecycle loop.
async fn start(
    config: ShellConfig,
    verifier: BootVerifier,
    outcome: BootOutcome,
    lock: Option<InstanceLock>,
) -> anyhow::Result<i32> {
    let verdict = outcome.verdict;
    let settings = SettingsStore::new(&config.paths.settings_file);
    let config = if verdict.is_bootable() {
        config.with_settings(&settings.load())
    } else {
        config
    };

    let host = StdioHost::stdout();
    let minimized = host.minimized_flag();
    let device = DeviceState::new();

    let engine = Arc::new(
        ProcessEngineSupervisor::new(
            config
                .engine
                .clone()
                .unwrap_or_else(|| DEFAULT_ENGINE_PROGRAM.into()),
        ),
    );

    let updater = if verdict.is_bootable() && config.updates_enabled && updates_supported() {
        match GitHubUpdater::new(config.download_dir()) {
            Ok(updater) => Some(Arc::new(updater) as Arc<dyn UpdateChecker>),
            Err(e) => {
                tracing::warn!(error = %e, "Update checks unavailable");
                None
            }
        }
    } else {
        None
    };

    let (mut orchestrator, events) = Orchestrator::new(
        config.orchestrator_config(verdict),
        Collaborators {
            host: Box::new(host),
            monitor: Box::new(UsbPollMonitor::default()),
            engine: engine.clone(),
            updater,
            settings,
            device_info: Arc::new(device.clone()),
        },
    );
    let sender = orchestrator.sender();

    let listener = match &lock {
        Some(lock) => Some(
            lock.listen(sender.clone())
                .await
                .context("failed to listen for second-instance notifications")?,
        ),
        None => None,
    };

    if verdict.is_bootable() {
        orchestrator.track(spawn_retention(verifier));

        if config.engine.is_some() {
            launch_engine(&engine).await;
        }
    }

    tokio::spawn(forward_signals(
        BufReader::new(tokio::io::stdin()),
        sender.clone(),
        minimized,
        device,
    ));

    let interrupt = sender.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            let _ = interrupt.send(LifecycleEvent::BeforeQuit);
        }
    });

    sender
        .send(LifecycleEvent::Ready)
        .context("lifecycle loop closed before start")?;

    let report = orchestrator.run(events).await;

    if let Some(listener) = listener {
        listener.abort();
    }
    drop(lock);

    Ok(report.exit_code)
}

fn log_boot_outcome(outcome: &BootOutcome) {
    tracing::info!(
        verdict = %outcome.verdict,
        warm_start = outcome.warm_start,
        "Profile checked"
    );

    if let Some(report) = &outcome.report {
        tracing::info!(
            created = report.created.len(),
            removed_previous_profile = report.removed_previous_profile,
            "Profile initialized"
        );
        for failure in &report.failures {
            tracing::warn!(
                step = ?failure.step,
                path = %failure.path.display(),
                error = %failure.error,
                "Profile initialization step failed"
            );
        }
    }
}

/// Routes panics to the log file before the default hook runs.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        default_hook(panic_info);
    }));
}
