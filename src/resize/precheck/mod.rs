//! Filesystem specific checks that can prove a resize unnecessary.

pub mod ufs;

use crate::common::process::CommandRunner;
use crate::ui::LogSink;

/// Inputs a pre-check may consult.
pub struct PrecheckContext<'a> {
    /// Path being resized, as passed to the metadata dump tools.
    pub mount_point: &'a str,
    pub device_path: &'a str,
    pub runner: &'a dyn CommandRunner,
    pub log: &'a dyn LogSink,
}

/// Returns true when the resize can be skipped.
pub type Precheck = fn(&PrecheckContext<'_>) -> bool;

/// Registered pre-checks keyed by filesystem type prefix.
pub const PRECHECKS: [(&str, Precheck); 1] = [("ufs", ufs::can_skip_resize)];

/// Consult the pre-check registered for `fs_type`.
///
/// Filesystems without a pre-check are never skipped.
pub fn can_skip_resize(fs_type: &str, ctx: &PrecheckContext<'_>) -> bool {
    let fs_type = fs_type.to_lowercase();
    PRECHECKS
        .iter()
        .find(|(prefix, _)| fs_type.starts_with(prefix))
        .is_some_and(|(_, check)| check(ctx))
}
