//! Running the resize command, inline or detached.

use super::dispatch::ResizeCommand;
use crate::common::process::{CommandRunner, ProcessError};
use crate::ui::{Level, LogSink};
use serde_json::json;
use std::env;
use std::io;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

pub const FOREGROUND_LABEL: &str = "Resizing";
pub const BACKGROUND_LABEL: &str = "backgrounded Resizing";

/// Run `f`, then log how long it took whether or not it succeeded.
pub fn log_time<T>(log: &dyn LogSink, label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed().as_secs_f64();
    log.emit(
        Level::Debug,
        "resizefs.timing",
        &format!("{} took {:.3} seconds", label, elapsed),
        Some(json!({ "label": label, "seconds": elapsed })),
    );
    result
}

/// Run the resize command to completion, logging a failure with the full
/// command line before returning it.
pub fn do_resize(
    command: &ResizeCommand,
    runner: &dyn CommandRunner,
    log: &dyn LogSink,
) -> Result<(), ProcessError> {
    runner.run(command.argv()).map(|_| ()).map_err(|e| {
        log.emit(
            Level::Error,
            "resizefs.resize_failed",
            &format!("Failed to resize filesystem (cmd={}): {}", command, e),
            Some(json!({
                "program": command.program(),
                "argv": command.argv(),
                "error": e.to_string(),
            })),
        );
        e
    })
}

/// Timed [`do_resize`].
pub fn run_timed(
    command: &ResizeCommand,
    runner: &dyn CommandRunner,
    log: &dyn LogSink,
    label: &str,
) -> Result<(), ProcessError> {
    log_time(log, label, || do_resize(command, runner, log))
}

/// Starts a resize that the caller does not wait for.
///
/// Failures of the detached resize only reach the log.
pub trait Detach: Send + Sync {
    fn detach(
        &self,
        command: ResizeCommand,
        runner: Arc<dyn CommandRunner>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<()>;
}

/// Runs the resize on a worker thread of this process.
///
/// The caller is not blocked; [`ThreadDetacher::wait`] lets a short-lived
/// process keep the workers alive until they finish.
#[derive(Debug, Default)]
pub struct ThreadDetacher {
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadDetacher {
    /// Block until every worker started so far has finished.
    pub fn wait(&self) {
        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Detach for ThreadDetacher {
    fn detach(
        &self,
        command: ResizeCommand,
        runner: Arc<dyn CommandRunner>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<()> {
        let worker = thread::Builder::new()
            .name("resizefs-worker".to_string())
            .spawn(move || {
                let _ = run_timed(&command, runner.as_ref(), log.as_ref(), BACKGROUND_LABEL);
            })?;
        if let Ok(mut workers) = self.workers.lock() {
            workers.push(worker);
        }
        Ok(())
    }
}

/// Re-executes this binary as `resizefs worker -- <argv>`.
///
/// The worker is its own process, so the resize keeps running after the
/// invoking process exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReexecDetacher;

impl ReexecDetacher {
    fn worker_args(command: &ResizeCommand) -> Vec<String> {
        let mut args = Vec::new();
        if crate::ui::is_debug_enabled() {
            args.push("--debug".to_string());
        }
        if crate::ui::get_output_format() == crate::ui::OutputFormat::Json {
            args.push("--json".to_string());
        }
        args.push("worker".to_string());
        args.push("--".to_string());
        args.extend(command.argv().iter().cloned());
        args
    }
}

impl Detach for ReexecDetacher {
    fn detach(
        &self,
        command: ResizeCommand,
        _runner: Arc<dyn CommandRunner>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<()> {
        let exe = env::current_exe()?;
        let child = Command::new(&exe)
            .args(Self::worker_args(&command))
            .stdin(Stdio::null())
            .spawn()?;
        log.debug(
            "resizefs.worker_started",
            &format!("Started resize worker pid {} for '{}'", child.id(), command),
        );
        // Not waited on; the worker outlives this process
        Ok(())
    }
}
