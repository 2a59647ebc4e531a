//! cloud-config options read by the resize module.

use super::schema::SchemaValidationError;
use serde_yaml::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TMP_DIR: &str = "/run";

/// `resize_rootfs` value enabling background resizing.
pub const NOBLOCK: &str = "noblock";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configfile {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cloud-config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
}

/// How (and whether) to resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    Off,
    #[default]
    Block,
    NoBlock,
}

impl ResizeMode {
    /// Boot-config truthiness: `true`, `1`, `on`, `yes`, `y` resize inline,
    /// `noblock` resizes in the background, everything else disables.
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            NOBLOCK => ResizeMode::NoBlock,
            "true" | "1" | "on" | "yes" | "y" => ResizeMode::Block,
            _ => ResizeMode::Off,
        }
    }

    /// Mode for a `resize_rootfs` value of any YAML type.
    ///
    /// Null, floats, sequences and mappings disable resizing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => ResizeMode::Block,
            Value::String(s) => ResizeMode::parse(s),
            Value::Number(n) if n.is_i64() || n.is_u64() => ResizeMode::parse(&n.to_string()),
            _ => ResizeMode::Off,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != ResizeMode::Off
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeMode::Off => f.write_str("False"),
            ResizeMode::Block => f.write_str("True"),
            ResizeMode::NoBlock => f.write_str(NOBLOCK),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResizeConfig {
    pub resize_rootfs: Option<ResizeMode>,
    pub resize_rootfs_tmp: Option<PathBuf>,
}

impl ResizeConfig {
    /// Read the resize options out of a whole cloud-config document.
    ///
    /// Never fails: schema problems are reported by validation beforehand.
    /// A document that is not a mapping yields the defaults, unrelated keys
    /// are ignored and a non-string `resize_rootfs_tmp` falls back to
    /// [`DEFAULT_TMP_DIR`].
    pub fn from_value(value: &Value) -> Self {
        let Value::Mapping(map) = value else {
            return Self::default();
        };
        Self {
            resize_rootfs: map.get("resize_rootfs").map(ResizeMode::from_value),
            resize_rootfs_tmp: map
                .get("resize_rootfs_tmp")
                .and_then(Value::as_str)
                .map(PathBuf::from),
        }
    }

    /// Effective mode: the first override argument wins over the config.
    pub fn mode(&self, overrides: &[String]) -> ResizeMode {
        match overrides.first() {
            Some(arg) => ResizeMode::parse(arg),
            None => self.resize_rootfs.unwrap_or_default(),
        }
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.resize_rootfs_tmp
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TMP_DIR))
    }
}

pub fn parse_document(content: &str) -> Result<Value, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
}

pub fn read_document(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
