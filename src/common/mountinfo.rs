//! Mount table parsing.
//!
//! Linux exposes `/proc/self/mountinfo`; BSD hosts only have the output of
//! `mount`. Both are reduced to [`MountEntry`] rows and the entry covering a
//! path is chosen by longest mount point prefix.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub fs_type: String,
    pub mount_point: String,
}

/// Undo the octal escaping the kernel applies to spaces, tabs, newlines and backslashes.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse `/proc/<pid>/mountinfo` content.
///
/// Format: `id parent major:minor root mount_point options [optional...] - fstype source super_options`
pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let (head, tail) = line.split_once(" - ")?;
            let mount_point = head.split_whitespace().nth(4)?;
            let mut tail = tail.split_whitespace();
            let fs_type = tail.next()?;
            let source = tail.next()?;
            Some(MountEntry {
                source: unescape(source),
                fs_type: fs_type.to_string(),
                mount_point: unescape(mount_point),
            })
        })
        .collect()
}

/// Parse BSD style `mount` output: `/dev/ada0p2 on / (ufs, local, journaled soft-updates)`
pub fn parse_mount_output(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let (source, rest) = line.split_once(" on ")?;
            let (mount_point, opts) = rest.rsplit_once(" (")?;
            let fs_type = opts
                .trim_end_matches(')')
                .split(',')
                .next()?
                .trim();
            if fs_type.is_empty() {
                return None;
            }
            Some(MountEntry {
                source: source.trim().to_string(),
                fs_type: fs_type.to_string(),
                mount_point: mount_point.trim().to_string(),
            })
        })
        .collect()
}

/// Entry whose mount point is the longest prefix of `path`.
///
/// Later entries win ties, since a later mount on the same point shadows earlier ones.
pub fn covering_entry<'a>(path: &Path, entries: &'a [MountEntry]) -> Option<&'a MountEntry> {
    let mut best: Option<&MountEntry> = None;
    for entry in entries {
        if !path.starts_with(&entry.mount_point) {
            continue;
        }
        let longer = best.is_none_or(|b| {
            Path::new(&entry.mount_point).components().count()
                >= Path::new(&b.mount_point).components().count()
        });
        if longer {
            best = Some(entry);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTINFO: &str = r#"22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw,errors=remount-ro
23 22 0:21 / /proc rw,nosuid,nodev,noexec,relatime shared:12 - proc proc rw
24 22 0:22 / /sys rw,nosuid,nodev,noexec,relatime shared:7 - sysfs sysfs rw
40 22 8:2 / /srv/my\040data rw,relatime shared:30 - xfs /dev/sda2 rw,attr2
41 22 0:45 / /run rw,nosuid,nodev shared:5 - tmpfs tmpfs rw,size=813000k
"#;

    #[test]
    fn test_parse_mountinfo() {
        let entries = parse_mountinfo(MOUNTINFO);
        assert_eq!(entries.len(), 5);
        assert_eq!(
            entries[0],
            MountEntry {
                source: "/dev/sda1".to_string(),
                fs_type: "ext4".to_string(),
                mount_point: "/".to_string(),
            }
        );
        assert_eq!(entries[3].mount_point, "/srv/my data");
    }

    #[test]
    fn test_covering_entry_prefers_deepest_mount() {
        let entries = parse_mountinfo(MOUNTINFO);
        let root = covering_entry(Path::new("/"), &entries).unwrap();
        assert_eq!(root.source, "/dev/sda1");

        let data = covering_entry(Path::new("/srv/my data/file"), &entries).unwrap();
        assert_eq!(data.fs_type, "xfs");

        let etc = covering_entry(Path::new("/etc/fstab"), &entries).unwrap();
        assert_eq!(etc.mount_point, "/");
    }

    #[test]
    fn test_covering_entry_later_mount_shadows() {
        let entries = vec![
            MountEntry {
                source: "rootfs".to_string(),
                fs_type: "rootfs".to_string(),
                mount_point: "/".to_string(),
            },
            MountEntry {
                source: "/dev/root".to_string(),
                fs_type: "ext4".to_string(),
                mount_point: "/".to_string(),
            },
        ];
        let root = covering_entry(Path::new("/"), &entries).unwrap();
        assert_eq!(root.source, "/dev/root");
    }

    #[test]
    fn test_parse_mount_output() {
        let output = r#"/dev/ada0p2 on / (ufs, local, journaled soft-updates)
devfs on /dev (devfs)
/dev/ada1p1 on /mnt/with space (ufs, local)
"#;
        let entries = parse_mount_output(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].source, "/dev/ada0p2");
        assert_eq!(entries[0].fs_type, "ufs");
        assert_eq!(entries[0].mount_point, "/");
        assert_eq!(entries[1].fs_type, "devfs");
        assert_eq!(entries[2].mount_point, "/mnt/with space");
    }

    #[test]
    fn test_unescape_leaves_plain_backslash() {
        assert_eq!(unescape(r"a\b"), r"a\b");
        assert_eq!(unescape(r"tab\011x"), "tab\tx");
    }
}
