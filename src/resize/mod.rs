//! Root filesystem resize.
//!
//! Finds the device backing `/`, checks that it can be resized, asks the
//! filesystem specific pre-check whether the work is already done, and runs
//! the matching grow tool inline or in the background.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod host;
pub mod precheck;
pub mod rootdev;
pub mod schema;

pub use config::{ResizeConfig, ResizeMode};
pub use error::ResizeError;

use crate::common::process::{CommandRunner, DuctRunner};
use crate::ui::{Console, Level, LogSink};
use device::{DeviceCheck, DeviceCondition};
use executor::Detach;
use host::{Host, SystemHost};
use precheck::PrecheckContext;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Module name used in log messages.
pub const MODULE_NAME: &str = "resizefs";

/// Path whose filesystem is grown.
pub const RESIZE_TARGET: &str = "/";

/// Mount backing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub device_path: String,
    pub fs_type: String,
    pub mount_point: String,
}

/// How an invocation ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Disabled,
    NoMountInfo,
    RootDeviceUnresolved,
    DeviceUnusable(DeviceCondition),
    Skipped,
    UnknownFilesystem(String),
    Resized,
    Backgrounded,
}

pub struct Resizer {
    host: Arc<dyn Host>,
    runner: Arc<dyn CommandRunner>,
    log: Arc<dyn LogSink>,
    detacher: Arc<dyn Detach>,
}

impl Resizer {
    pub fn new(
        host: Arc<dyn Host>,
        runner: Arc<dyn CommandRunner>,
        log: Arc<dyn LogSink>,
        detacher: Arc<dyn Detach>,
    ) -> Self {
        Self {
            host,
            runner,
            log,
            detacher,
        }
    }

    /// Resizer for the running machine, logging to the console.
    pub fn system(detacher: Arc<dyn Detach>) -> Self {
        Self::new(
            Arc::new(SystemHost),
            Arc::new(DuctRunner),
            Arc::new(Console),
            detacher,
        )
    }

    fn debug(&self, code: &str, message: &str) {
        self.log.debug(code, message);
    }

    fn warn(&self, code: &str, message: &str) {
        self.log.warn(code, message);
    }

    /// Run the module once.
    ///
    /// `args[0]`, when present, overrides `resize_rootfs`.
    pub fn handle(&self, name: &str, config: &ResizeConfig, args: &[String]) -> Result<Outcome, ResizeError> {
        let mode = config.mode(args);
        if !mode.is_enabled() {
            self.debug(
                "resizefs.disabled",
                &format!("Skipping module named {}, resizing disabled", name),
            );
            return Ok(Outcome::Disabled);
        }

        let tmp_dir = config.tmp_dir();
        fs::create_dir_all(&tmp_dir).map_err(|source| ResizeError::WorkDir {
            path: tmp_dir.clone(),
            source,
        })?;

        let mount = match self.host.mount_info(Path::new(RESIZE_TARGET)) {
            Ok(Some(mount)) => mount,
            Ok(None) => {
                self.warn(
                    "resizefs.no_mount_info",
                    &format!("Could not determine filesystem type of {}", RESIZE_TARGET),
                );
                return Ok(Outcome::NoMountInfo);
            }
            Err(e) => {
                self.warn(
                    "resizefs.no_mount_info",
                    &format!("Could not determine filesystem type of {}: {:#}", RESIZE_TARGET, e),
                );
                return Ok(Outcome::NoMountInfo);
            }
        };

        let info = format!(
            "dev={} mnt_point={} path={}",
            mount.device_path, mount.mount_point, RESIZE_TARGET
        );
        self.debug("resizefs.resize_info", &format!("resize_info: {}", info));

        let in_container = self.host.is_container();

        let Some(device) =
            device::resolve_device(&mount.device_path, self.host.as_ref(), in_container, self.log.as_ref())
        else {
            self.warn(
                "resizefs.rootdev_unresolved",
                &format!("Unable to find device '{}'", mount.device_path),
            );
            return Ok(Outcome::RootDeviceUnresolved);
        };

        if let DeviceCheck::Unusable(condition) =
            device::validate_device(&device, in_container, &info, self.log.as_ref())?
        {
            return Ok(Outcome::DeviceUnusable(condition));
        }

        let ctx = PrecheckContext {
            mount_point: RESIZE_TARGET,
            device_path: &device,
            runner: self.runner.as_ref(),
            log: self.log.as_ref(),
        };
        if precheck::can_skip_resize(&mount.fs_type, &ctx) {
            self.debug(
                "resizefs.skipped",
                &format!(
                    "Skip resize filesystem type {} for {}",
                    mount.fs_type, RESIZE_TARGET
                ),
            );
            return Ok(Outcome::Skipped);
        }

        let Some(family) = dispatch::select(&mount.fs_type) else {
            self.warn(
                "resizefs.unknown_filesystem",
                &format!(
                    "Not resizing unknown filesystem type {} for {}",
                    mount.fs_type, RESIZE_TARGET
                ),
            );
            return Ok(Outcome::UnknownFilesystem(mount.fs_type));
        };

        let command = family.resize_command(RESIZE_TARGET, &device);
        self.debug(
            "resizefs.command",
            &format!("Resizing {} ({}) using {}", RESIZE_TARGET, mount.fs_type, command),
        );

        let (outcome, action, code) = if mode == ResizeMode::NoBlock {
            self.detacher
                .detach(command, Arc::clone(&self.runner), Arc::clone(&self.log))
                .map_err(ResizeError::Detach)?;
            (Outcome::Backgrounded, "Resizing (via forking)", "resizefs.backgrounded")
        } else {
            executor::run_timed(
                &command,
                self.runner.as_ref(),
                self.log.as_ref(),
                executor::FOREGROUND_LABEL,
            )
            .map_err(|source| ResizeError::Resize {
                command: command.to_string(),
                source,
            })?;
            (Outcome::Resized, "Resized", "resizefs.resized")
        };

        self.log.emit(
            Level::Debug,
            code,
            &format!(
                "{} root filesystem (type={}, val={})",
                action, mount.fs_type, mode
            ),
            Some(json!({
                "device": device,
                "fs_type": mount.fs_type,
                "mount_point": mount.mount_point,
                "mode": mode.to_string(),
            })),
        );

        Ok(outcome)
    }
}
