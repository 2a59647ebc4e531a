//! Filesystem type to resize command dispatch.

use crate::common::shell::shell_join;
use std::fmt;

/// Filesystem families with a known grow tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsFamily {
    Btrfs,
    Ext,
    Xfs,
    Ufs,
}

impl FsFamily {
    /// Type prefix matched against the lower-cased filesystem type.
    pub fn prefix(self) -> &'static str {
        match self {
            FsFamily::Btrfs => "btrfs",
            FsFamily::Ext => "ext",
            FsFamily::Xfs => "xfs",
            FsFamily::Ufs => "ufs",
        }
    }

    /// Command that grows a filesystem of this family to fill its device.
    pub fn resize_command(self, mount_point: &str, device_path: &str) -> ResizeCommand {
        let argv: Vec<&str> = match self {
            FsFamily::Btrfs => vec!["btrfs", "filesystem", "resize", "max", mount_point],
            FsFamily::Ext => vec!["resize2fs", device_path],
            FsFamily::Xfs => vec!["xfs_growfs", device_path],
            FsFamily::Ufs => vec!["growfs", device_path],
        };
        ResizeCommand::new(argv)
    }
}

impl fmt::Display for FsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Ordered dispatch rules; the first prefix match wins.
///
/// A list rather than a map so one rule can serve a whole family (ext2/ext3/ext4).
pub const RESIZE_RULES: [FsFamily; 4] = [FsFamily::Btrfs, FsFamily::Ext, FsFamily::Xfs, FsFamily::Ufs];

/// Pick the rule for a filesystem type, `None` for unknown filesystems.
pub fn select(fs_type: &str) -> Option<FsFamily> {
    let fs_type = fs_type.to_lowercase();
    RESIZE_RULES
        .into_iter()
        .find(|family| fs_type.starts_with(family.prefix()))
}

/// External program invocation: program name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeCommand {
    argv: Vec<String>,
}

impl ResizeCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for ResizeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_join(&self.argv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_family_shares_one_rule() {
        for fs_type in ["ext4", "ext3", "ext2"] {
            assert_eq!(select(fs_type), Some(FsFamily::Ext), "{fs_type}");
        }
    }

    #[test]
    fn test_select_is_case_insensitive() {
        assert_eq!(select("XFS"), Some(FsFamily::Xfs));
        assert_eq!(select("Btrfs"), Some(FsFamily::Btrfs));
        assert_eq!(select("UFS"), Some(FsFamily::Ufs));
    }

    #[test]
    fn test_select_unknown() {
        assert_eq!(select("zfs"), None);
        assert_eq!(select("vfat"), None);
        assert_eq!(select(""), None);
        // prefix matching is anchored at the start
        assert_eq!(select("fuse.ext4"), None);
    }

    #[test]
    fn test_resize_commands() {
        let mount_point = "/";
        let device = "/dev/sda1";
        assert_eq!(
            FsFamily::Btrfs.resize_command(mount_point, device).argv(),
            ["btrfs", "filesystem", "resize", "max", "/"]
        );
        assert_eq!(
            FsFamily::Ext.resize_command(mount_point, device).argv(),
            ["resize2fs", "/dev/sda1"]
        );
        assert_eq!(
            FsFamily::Xfs.resize_command(mount_point, device).argv(),
            ["xfs_growfs", "/dev/sda1"]
        );
        assert_eq!(
            FsFamily::Ufs.resize_command(mount_point, device).argv(),
            ["growfs", "/dev/sda1"]
        );
    }

    #[test]
    fn test_resize_command_display() {
        let command = FsFamily::Ext.resize_command("/", "/dev/vda1");
        assert_eq!(command.to_string(), "resize2fs /dev/vda1");
        assert_eq!(command.program(), "resize2fs");
    }
}
