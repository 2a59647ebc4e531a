//! Device validation before a resize is attempted.

use super::error::ResizeError;
use super::host::Host;
use super::rootdev::{ROOT_PLACEHOLDER, rootdev_from_cmdline};
use crate::ui::{Level, LogSink};
use nix::unistd::{AccessFlags, access};
use serde_json::json;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// Reasons a device cannot be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCondition {
    Missing,
    NotWritable,
    NotBlockDevice,
}

impl DeviceCondition {
    pub fn code(self) -> &'static str {
        match self {
            DeviceCondition::Missing => "resizefs.device_missing",
            DeviceCondition::NotWritable => "resizefs.device_not_writable",
            DeviceCondition::NotBlockDevice => "resizefs.device_not_block",
        }
    }

    fn message(self, device: &str, in_container: bool, info: &str) -> String {
        let suffix = if in_container { " in container" } else { "" };
        match self {
            DeviceCondition::Missing => {
                format!("Device '{}' did not exist{}. cannot resize: {}", device, suffix, info)
            }
            DeviceCondition::NotWritable => {
                format!("'{}' not writable{}. cannot resize: {}", device, suffix, info)
            }
            DeviceCondition::NotBlockDevice => format!(
                "device '{}' not a block device{}. cannot resize: {}",
                device, suffix, info
            ),
        }
    }
}

/// Log level for an unusable device: debug inside containers, warning elsewhere.
pub fn severity_for(_condition: DeviceCondition, in_container: bool) -> Level {
    if in_container { Level::Debug } else { Level::Warn }
}

/// Result of validating a device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCheck {
    Usable,
    Unusable(DeviceCondition),
}

/// Replace the `/dev/root` placeholder with the device named on the kernel
/// command line.
///
/// Returns `None` when the placeholder cannot be resolved.
pub fn resolve_device(device: &str, host: &dyn Host, in_container: bool, log: &dyn LogSink) -> Option<String> {
    if device != ROOT_PLACEHOLDER || Path::new(device).exists() || in_container {
        return Some(device.to_string());
    }

    let resolved = rootdev_from_cmdline(&host.cmdline())?;
    log.debug(
        "resizefs.rootdev",
        &format!("Converted {} to '{}' per kernel cmdline", ROOT_PLACEHOLDER, resolved),
    );
    Some(resolved)
}

fn report(
    condition: DeviceCondition,
    device: &str,
    in_container: bool,
    info: &str,
    log: &dyn LogSink,
) -> DeviceCheck {
    log.emit(
        severity_for(condition, in_container),
        condition.code(),
        &condition.message(device, in_container, info),
        Some(json!({ "device": device, "container": in_container })),
    );
    DeviceCheck::Unusable(condition)
}

/// Check that `device` exists, is writable and is a block or character device.
///
/// Unusable devices are logged and reported as a value; stat failures other
/// than "not found" are errors.
pub fn validate_device(
    device: &str,
    in_container: bool,
    info: &str,
    log: &dyn LogSink,
) -> Result<DeviceCheck, ResizeError> {
    let metadata = match fs::metadata(device) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(report(DeviceCondition::Missing, device, in_container, info, log));
        }
        Err(source) => {
            return Err(ResizeError::Stat {
                path: device.to_string(),
                source,
            });
        }
    };

    if access(device, AccessFlags::W_OK).is_err() {
        return Ok(report(DeviceCondition::NotWritable, device, in_container, info, log));
    }

    let file_type = metadata.file_type();
    if !file_type.is_block_device() && !file_type.is_char_device() {
        return Ok(report(DeviceCondition::NotBlockDevice, device, in_container, info, log));
    }

    Ok(DeviceCheck::Usable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resize::host::fake::FakeHost;
    use crate::ui::sink::capture::Capture;
    use std::os::unix::fs::PermissionsExt;

    const INFO: &str = "dev=/dev/x mnt_point=/ path=/";

    #[test]
    fn test_severity_table() {
        for condition in [
            DeviceCondition::Missing,
            DeviceCondition::NotWritable,
            DeviceCondition::NotBlockDevice,
        ] {
            assert_eq!(severity_for(condition, true), Level::Debug);
            assert_eq!(severity_for(condition, false), Level::Warn);
        }
    }

    #[test]
    fn test_missing_device_in_container_is_debug() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("sda1");
        let device = device.to_str().unwrap();
        let log = Capture::new();

        let check = validate_device(device, true, INFO, &log).unwrap();

        assert_eq!(check, DeviceCheck::Unusable(DeviceCondition::Missing));
        let record = log.find("resizefs.device_missing").unwrap();
        assert_eq!(record.level, Level::Debug);
        assert!(record.message.contains("did not exist in container"));
    }

    #[test]
    fn test_missing_device_outside_container_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("sda1");
        let device = device.to_str().unwrap();
        let log = Capture::new();

        let check = validate_device(device, false, INFO, &log).unwrap();

        assert_eq!(check, DeviceCheck::Unusable(DeviceCondition::Missing));
        let record = log.find("resizefs.device_missing").unwrap();
        assert_eq!(record.level, Level::Warn);
        assert_eq!(
            record.message,
            format!("Device '{}' did not exist. cannot resize: {}", device, INFO)
        );
    }

    #[test]
    fn test_regular_file_is_not_a_block_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = file.path().to_str().unwrap();
        let log = Capture::new();

        let check = validate_device(device, false, INFO, &log).unwrap();

        assert_eq!(check, DeviceCheck::Unusable(DeviceCondition::NotBlockDevice));
        assert!(log.has(Level::Warn, "resizefs.device_not_block"));
    }

    #[test]
    fn test_read_only_device_is_not_writable() {
        // root passes access(2) regardless of permission bits
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o444)).unwrap();
        let device = file.path().to_str().unwrap();

        // Writability is checked before the device type
        let log = Capture::new();
        let check = validate_device(device, false, INFO, &log).unwrap();
        assert_eq!(check, DeviceCheck::Unusable(DeviceCondition::NotWritable));
        let record = log.find("resizefs.device_not_writable").unwrap();
        assert_eq!(record.level, Level::Warn);
        assert_eq!(
            record.message,
            format!("'{}' not writable. cannot resize: {}", device, INFO)
        );
        assert!(log.find("resizefs.device_not_block").is_none());

        let log = Capture::new();
        let check = validate_device(device, true, INFO, &log).unwrap();
        assert_eq!(check, DeviceCheck::Unusable(DeviceCondition::NotWritable));
        let record = log.find("resizefs.device_not_writable").unwrap();
        assert_eq!(record.level, Level::Debug);
        assert!(record.message.contains("not writable in container"));
    }

    #[test]
    fn test_character_device_is_usable() {
        let log = Capture::new();
        let check = validate_device("/dev/null", false, INFO, &log).unwrap();
        assert_eq!(check, DeviceCheck::Usable);
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_stat_failure_other_than_missing_is_an_error() {
        // A path through a regular file fails with ENOTDIR, not ENOENT
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = file.path().join("child");
        let log = Capture::new();

        let err = validate_device(device.to_str().unwrap(), false, INFO, &log).unwrap_err();
        assert!(matches!(err, ResizeError::Stat { .. }));
    }

    #[test]
    fn test_resolve_device_passthrough() {
        let host = FakeHost::default().with_cmdline("root=/dev/vda1");
        let log = Capture::new();
        assert_eq!(
            resolve_device("/dev/sda1", &host, false, &log),
            Some("/dev/sda1".to_string())
        );
        // containers keep the placeholder
        assert_eq!(
            resolve_device(ROOT_PLACEHOLDER, &host, true, &log),
            Some(ROOT_PLACEHOLDER.to_string())
        );
    }

    #[test]
    fn test_resolve_root_placeholder_from_cmdline() {
        if Path::new(ROOT_PLACEHOLDER).exists() {
            return;
        }
        let log = Capture::new();
        let host = FakeHost::default().with_cmdline("BOOT_IMAGE=/vmlinuz root=LABEL=rootfs ro");
        assert_eq!(
            resolve_device(ROOT_PLACEHOLDER, &host, false, &log),
            Some("/dev/disk/by-label/rootfs".to_string())
        );
        assert!(log.has(Level::Debug, "resizefs.rootdev"));

        let host = FakeHost::default().with_cmdline("ro quiet");
        assert_eq!(resolve_device(ROOT_PLACEHOLDER, &host, false, &log), None);
    }
}
