//! Root device resolution from the kernel command line.

/// Placeholder device some kernels report for the root mount.
pub const ROOT_PLACEHOLDER: &str = "/dev/root";

/// Translate the `root=` token of a kernel command line into a device path.
///
/// Returns `None` when no `root=` token is present.
pub fn rootdev_from_cmdline(cmdline: &str) -> Option<String> {
    let found = cmdline
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix("root="))?;

    if found.starts_with("/dev/") {
        return Some(found.to_string());
    }
    if let Some(label) = found.strip_prefix("LABEL=") {
        return Some(format!("/dev/disk/by-label/{}", label));
    }
    if let Some(uuid) = found.strip_prefix("UUID=") {
        return Some(format!("/dev/disk/by-uuid/{}", uuid));
    }

    Some(format!("/dev/{}", found))
}
