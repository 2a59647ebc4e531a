//! UFS already-sized detection using dumpfs and gpart.
//!
//! `dumpfs -m` prints the newfs invocation that would recreate the
//! filesystem; its `-s` (size in sectors) and `-f` (fragment size in bytes)
//! options give the current filesystem size. `gpart show` gives the size of
//! the backing partition in 512 byte sectors.

use super::PrecheckContext;
use crate::ui::Level;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use thiserror::Error;

/// Sector unit gpart reports sizes in.
const GPART_SECTOR_BYTES: u64 = 512;

/// Partition type label of UFS partitions in gpart listings.
const UFS_PARTITION_TYPE: &str = "freebsd-ufs";

/// newfs options in getopt notation; a trailing `:` marks an option taking a value.
const NEWFS_OPTSTRING: &str = "O:Ua:s:b:d:e:f:g:h:i:jk:m:o:L:";

#[derive(Error, Debug)]
pub enum NewfsParseError {
    #[error("Could not split newfs command line: {0}")]
    Tokenize(#[from] shell_words::ParseError),

    #[error("No newfs command line in dumpfs output")]
    MissingCommand,

    #[error("Unknown newfs option -{0}")]
    UnknownOption(char),

    #[error("newfs option -{0} requires an argument")]
    MissingArgument(char),

    #[error("Invalid value '{value}' for newfs option -{option}")]
    InvalidNumber { option: char, value: String },
}

/// Creation parameters recorded by the filesystem itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewfsParameters {
    pub current_size_sectors: Option<u64>,
    pub fragment_size_bytes: Option<u64>,
}

/// Size of the backing partition according to the partition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionExpectation {
    pub expected_size_sectors: Option<u64>,
}

fn takes_argument(option: char) -> Option<bool> {
    let mut chars = NEWFS_OPTSTRING.chars().peekable();
    while let Some(c) = chars.next() {
        let has_arg = chars.peek() == Some(&':');
        if has_arg {
            chars.next();
        }
        if c == option {
            return Some(has_arg);
        }
    }
    None
}

fn parse_number(option: char, value: &str) -> Result<u64, NewfsParseError> {
    value
        .parse()
        .map_err(|_| NewfsParseError::InvalidNumber {
            option,
            value: value.to_string(),
        })
}

/// Parse a recorded newfs command line such as
/// `newfs -O 2 -U -a 4 -b 32768 -f 4096 -s 58719232 /dev/label/rootfs`.
///
/// Option parsing stops at the first operand, as getopt does.
pub fn parse_newfs_line(line: &str) -> Result<NewfsParameters, NewfsParseError> {
    let tokens = shell_words::split(line)?;
    let mut params = NewfsParameters::default();

    let mut args = tokens.iter().skip(1);
    while let Some(token) = args.next() {
        if token == "--" {
            break;
        }
        let Some(flags) = token.strip_prefix('-').filter(|f| !f.is_empty()) else {
            break;
        };

        for (pos, option) in flags.char_indices() {
            match takes_argument(option) {
                None => return Err(NewfsParseError::UnknownOption(option)),
                Some(false) => continue,
                Some(true) => {}
            }

            // Value is either glued to the option (-s123) or the next token
            let inline = &flags[pos + option.len_utf8()..];
            let value = if inline.is_empty() {
                args.next()
                    .map(String::as_str)
                    .ok_or(NewfsParseError::MissingArgument(option))?
            } else {
                inline
            };

            match option {
                's' => params.current_size_sectors = Some(parse_number(option, value)?),
                'f' => params.fragment_size_bytes = Some(parse_number(option, value)?),
                _ => {}
            }
            break;
        }
    }

    Ok(params)
}

/// Extract newfs parameters from `dumpfs -m` output.
///
/// ```text
/// # newfs command for / (/dev/label/rootfs)
/// newfs -O 2 -U -a 4 -b 32768 -d 32768 -e 4096 -f 4096 -g 16384 -h 64 -i 8192 -j -k 6408 -m 8 -o time -s 58719232 /dev/label/rootfs
/// ```
pub fn parse_dumpfs_output(output: &str) -> Result<NewfsParameters, NewfsParseError> {
    let line = output
        .lines()
        .find(|line| !line.starts_with('#') && !line.trim().is_empty())
        .ok_or(NewfsParseError::MissingCommand)?;
    parse_newfs_line(line)
}

static PARTITION_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(/dev/.+)p([0-9]+)$").ok());

/// Split `/dev/da0p2` into the parent disk `/dev/da0` and partition index `2`.
pub fn parent_disk(device_path: &str) -> Option<(String, u32)> {
    let caps = PARTITION_SUFFIX.as_ref()?.captures(device_path)?;
    let index = caps[2].parse().ok()?;
    Some((caps[1].to_string(), index))
}

/// Extract the UFS partition size from `gpart show` output.
///
/// ```text
/// =>      40  62914480  da0  GPT  (30G)
///         40      1024    1  freebsd-boot  (512K)
///       1064  58719232    2  freebsd-ufs  (28G)
///   58720296   3145728    3  freebsd-swap  (1.5G)
/// ```
///
/// With several UFS rows the one whose index column equals `index` wins,
/// otherwise the first one is used.
pub fn parse_gpart_output(output: &str, index: Option<u32>) -> PartitionExpectation {
    let rows: Vec<Vec<&str>> = output
        .lines()
        .filter(|line| line.contains(UFS_PARTITION_TYPE))
        .map(|line| line.split_whitespace().collect())
        .collect();

    let matching_index = index.and_then(|index| {
        rows.iter()
            .find(|fields| fields.get(2).and_then(|f| f.parse::<u32>().ok()) == Some(index))
    });

    let expected_size_sectors = matching_index
        .or_else(|| rows.first())
        .and_then(|fields| fields.get(1))
        .and_then(|size| size.parse().ok());

    PartitionExpectation {
        expected_size_sectors,
    }
}

/// Round the partition size down to whole fragments, the unit the
/// filesystem records its size in.
///
/// `None` when the fragment size is smaller than a sector.
pub fn normalized_expected(expected_sectors: u64, fragment_size_bytes: u64) -> Option<u64> {
    let sectors_per_fragment = fragment_size_bytes / GPART_SECTOR_BYTES;
    if sectors_per_fragment == 0 {
        return None;
    }
    Some(expected_sectors - expected_sectors % sectors_per_fragment)
}

/// Pure decision: skip only when every value resolved and the sizes agree.
pub fn sizes_match(newfs: &NewfsParameters, partition: &PartitionExpectation) -> bool {
    let (Some(current), Some(fragment), Some(expected)) = (
        newfs.current_size_sectors,
        newfs.fragment_size_bytes,
        partition.expected_size_sectors,
    ) else {
        return false;
    };

    normalized_expected(expected, fragment) == Some(current)
}

/// True when the UFS filesystem on `ctx.device_path` already fills its partition.
///
/// Any value that cannot be determined (tool failure, missing option,
/// unexpected device naming) answers "do not skip", so the resize is
/// attempted and growfs has the final word.
pub fn can_skip_resize(ctx: &PrecheckContext<'_>) -> bool {
    let dumpfs = match ctx
        .runner
        .run(&["dumpfs".to_string(), "-m".to_string(), ctx.mount_point.to_string()])
    {
        Ok(output) => output.stdout,
        Err(e) => {
            ctx.log.warn(
                "resizefs.precheck_failed",
                &format!("dumpfs failed, not skipping resize: {}", e),
            );
            return false;
        }
    };

    let newfs = match parse_dumpfs_output(&dumpfs) {
        Ok(params) => params,
        Err(e) => {
            ctx.log.debug(
                "resizefs.precheck_undetermined",
                &format!("Could not read newfs parameters for {}: {}", ctx.mount_point, e),
            );
            return false;
        }
    };

    let Some((disk, index)) = parent_disk(ctx.device_path) else {
        ctx.log.debug(
            "resizefs.precheck_undetermined",
            &format!(
                "Device '{}' has no partition suffix, cannot compare with gpart",
                ctx.device_path
            ),
        );
        return false;
    };

    let gpart = match ctx
        .runner
        .run(&["gpart".to_string(), "show".to_string(), disk.clone()])
    {
        Ok(output) => output.stdout,
        Err(e) => {
            ctx.log.warn(
                "resizefs.precheck_failed",
                &format!("gpart failed, not skipping resize: {}", e),
            );
            return false;
        }
    };

    let partition = parse_gpart_output(&gpart, Some(index));
    let skip = sizes_match(&newfs, &partition);

    ctx.log.emit(
        Level::Debug,
        "resizefs.precheck_ufs",
        &format!(
            "UFS size check for {}: filesystem={:?} partition={:?} skip={}",
            ctx.device_path,
            newfs.current_size_sectors,
            partition.expected_size_sectors,
            skip
        ),
        Some(json!({
            "device": ctx.device_path,
            "disk": disk,
            "current_size_sectors": newfs.current_size_sectors,
            "fragment_size_bytes": newfs.fragment_size_bytes,
            "expected_size_sectors": partition.expected_size_sectors,
            "skip": skip,
        })),
    );

    skip
}
