//! Host facts the resize engine consumes: mount table, kernel command line,
//! container detection.

use super::MountInfo;
use crate::common::mountinfo::{self, MountEntry};
use crate::common::process::{CommandRunner, DuctRunner};
use anyhow::{Context, Result};
use duct::cmd;
use std::fs;
use std::path::Path;

const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";
const PROC_CMDLINE: &str = "/proc/cmdline";

pub trait Host: Send + Sync {
    /// Mount backing `path`, or `None` when it cannot be determined.
    fn mount_info(&self, path: &Path) -> Result<Option<MountInfo>>;

    /// Raw kernel boot command line.
    fn cmdline(&self) -> String;

    fn is_container(&self) -> bool;
}

/// The machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    fn mount_entries(&self) -> Result<Vec<MountEntry>> {
        if Path::new(PROC_MOUNTINFO).exists() {
            let content = fs::read_to_string(PROC_MOUNTINFO)
                .with_context(|| format!("reading {}", PROC_MOUNTINFO))?;
            return Ok(mountinfo::parse_mountinfo(&content));
        }

        // BSD hosts have no procfs mount table
        let output = DuctRunner
            .run(&["mount".to_string()])
            .context("listing mounts with mount")?;
        Ok(mountinfo::parse_mount_output(&output.stdout))
    }
}

impl Host for SystemHost {
    fn mount_info(&self, path: &Path) -> Result<Option<MountInfo>> {
        let entries = self.mount_entries()?;
        Ok(mountinfo::covering_entry(path, &entries).map(|entry| MountInfo {
            device_path: entry.source.clone(),
            fs_type: entry.fs_type.clone(),
            mount_point: entry.mount_point.clone(),
        }))
    }

    fn cmdline(&self) -> String {
        fs::read_to_string(PROC_CMDLINE)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    fn is_container(&self) -> bool {
        detect_container()
    }
}

fn detect_container() -> bool {
    if which::which("systemd-detect-virt").is_ok()
        && cmd("systemd-detect-virt", ["--quiet", "--container"])
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .is_ok_and(|out| out.status.success())
    {
        return true;
    }

    if Path::new("/run/systemd/container").exists() || Path::new("/.dockerenv").exists() {
        return true;
    }

    fs::read("/proc/1/environ").is_ok_and(|environ| environ_declares_container(&environ))
}

/// `/proc/<pid>/environ` is NUL separated `KEY=value` pairs.
fn environ_declares_container(environ: &[u8]) -> bool {
    environ
        .split(|b| *b == 0)
        .any(|var| var.starts_with(b"container="))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environ_declares_container() {
        assert!(environ_declares_container(
            b"PATH=/usr/bin\0container=podman\0HOME=/"
        ));
        assert!(!environ_declares_container(b"PATH=/usr/bin\0HOME=/\0"));
        assert!(!environ_declares_container(b"not_container=1"));
    }

    #[test]
    fn test_system_host_finds_root_mount() {
        // Every test host has something mounted at /
        if !Path::new(PROC_MOUNTINFO).exists() {
            return;
        }
        let info = SystemHost.mount_info(Path::new("/")).unwrap().unwrap();
        assert_eq!(info.mount_point, "/");
        assert!(!info.fs_type.is_empty());
    }
}
