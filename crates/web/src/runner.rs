//! Test run orchestration
//!
//! The panel launches at most one suite at a time. Progress is reported as a
//! stream of [`ProgressEvent`]s ending in exactly one terminal event; the
//! suite itself is an external program behind the [`SuiteRunner`] seam.

use async_trait::async_trait;
use autotest_common::devices::{self, DeviceConfig};
use autotest_common::{document, Error, ProgressEvent, Result, Suite};
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::settings::{PanelConfig, SuiteCommands};

pub const NO_DEVICES: &str = "No devices in config";
pub const RUN_STOPPED: &str = "Run stopped";

/// Executes one suite against the configured devices.
#[async_trait]
pub trait SuiteRunner: Send + Sync {
    async fn run(
        &self,
        suite: Suite,
        devices: &[DeviceConfig],
        cancel: CancellationToken,
    ) -> Result<String>;
}

/// Runs the command configured for a suite and reports its output.
pub struct CommandRunner {
    commands: SuiteCommands,
    workdir: PathBuf,
    config_file: PathBuf,
}

impl CommandRunner {
    pub fn new(commands: SuiteCommands, workdir: PathBuf, config_file: PathBuf) -> Self {
        Self {
            commands,
            workdir,
            config_file,
        }
    }

    pub fn from_config(cfg: &PanelConfig) -> Self {
        Self::new(cfg.suites.clone(), cfg.workdir.clone(), cfg.config_file.clone())
    }
}

#[async_trait]
impl SuiteRunner for CommandRunner {
    async fn run(
        &self,
        suite: Suite,
        devices: &[DeviceConfig],
        cancel: CancellationToken,
    ) -> Result<String> {
        let Some((program, args)) = self.commands.command(suite).split_first() else {
            return Err(Error::InvalidConfig(format!(
                "no command configured for suite {}",
                suite
            )));
        };

        let mut lines = Vec::new();
        if suite == Suite::Firmware && devices::firmware_versions(devices).is_empty() {
            lines.push("Warning: FIRMWARE_VERSIONS is not set in config".to_string());
        }
        for device in devices {
            lines.push(device.summary_line());
        }
        lines.push(String::new());

        info!(%suite, program = %program, devices = devices.len(), "launching suite command");

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .env("AUTOTEST_SUITE", suite.as_str())
            .env("AUTOTEST_CONFIG", &self.config_file)
            .env("AUTOTEST_DEVICE_COUNT", devices.len().to_string())
            .kill_on_drop(true);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            output = command.output() => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        lines.push(stdout.trim().to_string());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%suite, status = %output.status, "suite command failed");
            lines.push(format!("{} exited with {}", program, output.status));
            if !stderr.trim().is_empty() {
                lines.push(stderr.trim().to_string());
            }
        }

        Ok(lines.join("\n").trim().to_string())
    }
}

/// Outcome of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { result: Option<String> },
    Idle,
}

#[derive(Debug)]
struct ActiveRun {
    id: Uuid,
    suite: Suite,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

/// Single-slot run coordinator.
pub struct RunManager {
    runner: Arc<dyn SuiteRunner>,
    config_file: PathBuf,
    logs_dir: PathBuf,
    step: Duration,
    active: Mutex<Option<ActiveRun>>,
    last_result: Mutex<Option<String>>,
}

impl RunManager {
    pub fn new(
        runner: Arc<dyn SuiteRunner>,
        config_file: PathBuf,
        logs_dir: PathBuf,
        step: Duration,
    ) -> Self {
        Self {
            runner,
            config_file,
            logs_dir,
            step,
            active: Mutex::new(None),
            last_result: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &PanelConfig, runner: Arc<dyn SuiteRunner>) -> Self {
        Self::new(
            runner,
            cfg.config_file.clone(),
            cfg.logs_dir.clone(),
            cfg.progress_step(),
        )
    }

    /// Suite currently running, if any.
    pub fn running(&self) -> Option<Suite> {
        self.active.lock().as_ref().map(|run| run.suite)
    }

    pub fn last_result(&self) -> Option<String> {
        self.last_result.lock().clone()
    }

    /// Start `suite` and return its progress stream.
    ///
    /// While another run is active the stream holds a single terminal event
    /// saying so.
    pub fn start(self: &Arc<Self>, suite: Suite) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(32);
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        {
            let mut active = self.active.lock();
            if let Some(run) = active.as_ref() {
                warn!(requested = %suite, running = %run.suite, "run rejected, another run is active");
                let busy = Error::Busy(run.suite.to_string());
                // fresh channel with spare capacity
                let _ = tx.try_send(ProgressEvent::finished(busy.to_string()));
                return rx;
            }
            *active = Some(ActiveRun {
                id,
                suite,
                cancel: cancel.clone(),
                started_at: Utc::now(),
            });
        }

        info!(%suite, run_id = %id, "run started");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = manager.execute(suite, &tx, cancel).await;

            // A stop that reached the run before release wins over whatever
            // the runner returned, so the stream agrees with the stop reply.
            let stopped = manager.release(id);
            let message = match outcome {
                _ if stopped => RUN_STOPPED.to_string(),
                Ok(Some(report)) => {
                    manager.record_result(&report);
                    if let Err(e) = write_report(&manager.logs_dir, suite, &report).await {
                        warn!(%suite, "failed to write run report: {}", e);
                    }
                    report
                }
                Ok(None) => NO_DEVICES.to_string(),
                Err(Error::Cancelled) => RUN_STOPPED.to_string(),
                Err(e) => {
                    error!(%suite, run_id = %id, "run failed: {}", e);
                    let message = format!("Error: {}", e);
                    manager.record_result(&message);
                    message
                }
            };

            if tx.send(ProgressEvent::finished(message)).await.is_err() {
                debug!(run_id = %id, "progress stream closed before the terminal event");
            }
        });

        rx
    }

    /// Cancel the active run.
    ///
    /// The slot is held until the run task releases it, so a run whose runner
    /// already returned can still be stopped here; its stream then ends with
    /// the stopped message and its result is discarded.
    pub fn stop(&self) -> StopOutcome {
        match self.active.lock().as_ref() {
            Some(run) => {
                info!(suite = %run.suite, run_id = %run.id, "stopping run");
                run.cancel.cancel();
                StopOutcome::Stopped {
                    result: self.last_result(),
                }
            }
            None => StopOutcome::Idle,
        }
    }

    async fn execute(
        &self,
        suite: Suite,
        tx: &mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<Option<String>> {
        let text = match tokio::fs::read_to_string(&self.config_file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.config_file.display(), "config file not found");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let devices = devices::devices(&document::parse(&text));
        if devices.is_empty() {
            return Ok(None);
        }

        let total = devices.len();
        for completed in 1..=total {
            // a closed stream does not stop the run
            let _ = tx.send(ProgressEvent::tick(completed, total)).await;
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.step) => {}
            }
        }

        let report = self.runner.run(suite, &devices, cancel).await?;
        Ok(Some(report))
    }

    fn record_result(&self, result: &str) {
        *self.last_result.lock() = Some(result.to_string());
    }

    /// Free the slot held by run `id`; returns whether it was stopped.
    fn release(&self, id: Uuid) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().map(|run| run.id) != Some(id) {
            return false;
        }
        match active.take() {
            Some(run) => {
                let elapsed = Utc::now() - run.started_at;
                let stopped = run.cancel.is_cancelled();
                info!(suite = %run.suite, run_id = %id, elapsed_ms = elapsed.num_milliseconds(), stopped, "run finished");
                stopped
            }
            None => false,
        }
    }
}

/// Write a run report as `log<suite>_<timestamp>.txt`.
async fn write_report(dir: &Path, suite: Suite, report: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!("log{}_{}.txt", suite, Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(name);
    tokio::fs::write(&path, report).await?;
    info!(path = %path.display(), "run report saved");
    Ok(path)
}
