//! Schema checks and documentation for the resize module's cloud-config keys.

use super::config::{ConfigError, NOBLOCK, parse_document, read_document};
use crate::ui::LogSink;
use serde_yaml::Value;
use std::fmt;
use std::path::Path;

pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// How often the surrounding scheduler runs a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Always,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Always => f.write_str("always"),
        }
    }
}

pub struct ConfigKey {
    pub name: &'static str,
    pub type_name: &'static str,
    pub description: &'static str,
}

/// Static description of a config module.
pub struct ModuleInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub frequency: Frequency,
    pub distros: &'static [&'static str],
    pub keys: &'static [ConfigKey],
    pub example: &'static str,
}

pub const MODULE: ModuleInfo = ModuleInfo {
    id: "cc_resizefs",
    name: "Resizefs",
    title: "Resize a filesystem",
    description: "Resize a filesystem to use all available space on its partition. Run after \
the root partition has been grown so that the root filesystem grows with it. By default the \
resize blocks the boot process while the resize command runs. Setting resize_rootfs to \
\"noblock\" performs the resize in the background instead, and setting it to false disables \
the module.",
    frequency: Frequency::Always,
    distros: &["all"],
    keys: &[
        ConfigKey {
            name: "resize_rootfs",
            type_name: "boolean/string",
            description: "Whether to resize the root filesystem: true, false or \"noblock\" to \
resize in the background. Default: true",
        },
        ConfigKey {
            name: "resize_rootfs_tmp",
            type_name: "string",
            description: "Directory created before resizing. Default: /run",
        },
    ],
    example: "resize_rootfs: noblock\nresize_rootfs_tmp: /run",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub key: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug)]
pub struct SchemaValidationError {
    pub issues: Vec<SchemaIssue>,
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issues: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "Cloud config schema errors: {}", issues.join(", "))
    }
}

impl std::error::Error for SchemaValidationError {}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}

/// Schema violations in a cloud-config document, sorted by key.
pub fn schema_issues(config: &Value) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    let map = match config {
        Value::Null => return issues,
        Value::Mapping(map) => map,
        other => {
            issues.push(SchemaIssue {
                key: String::new(),
                message: format!("{} is not of type 'object'", describe(other)),
            });
            return issues;
        }
    };

    if let Some(value) = map.get("resize_rootfs") {
        let valid = match value {
            Value::Bool(_) => true,
            Value::String(s) => s == NOBLOCK,
            _ => false,
        };
        if !valid {
            issues.push(SchemaIssue {
                key: "resize_rootfs".to_string(),
                message: format!(
                    "{} is not one of [true, false, '{}']",
                    describe(value),
                    NOBLOCK
                ),
            });
        }
    }

    if let Some(value) = map.get("resize_rootfs_tmp")
        && !value.is_string()
    {
        issues.push(SchemaIssue {
            key: "resize_rootfs_tmp".to_string(),
            message: format!("{} is not of type 'string'", describe(value)),
        });
    }

    issues.sort_by(|a, b| a.key.cmp(&b.key));
    issues
}

/// Validate a parsed cloud-config document.
///
/// Strict mode fails on any issue; otherwise issues are logged as a single
/// warning and processing continues.
pub fn validate_config(config: &Value, strict: bool, log: &dyn LogSink) -> Result<(), ConfigError> {
    let issues = schema_issues(config);
    if issues.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(SchemaValidationError { issues }.into());
    }

    let lines: Vec<String> = issues.iter().map(ToString::to_string).collect();
    log.warn(
        "resizefs.invalid_config",
        &format!("Invalid config:\n{}", lines.join("\n")),
    );
    Ok(())
}

/// Strictly validate a cloud-config file on disk.
pub fn validate_config_file(path: &Path, log: &dyn LogSink) -> Result<(), ConfigError> {
    let content = read_document(path)?;

    if !content.starts_with(CLOUD_CONFIG_HEADER) {
        return Err(SchemaValidationError {
            issues: vec![SchemaIssue {
                key: "header".to_string(),
                message: format!(
                    "File {} needs to begin with \"{}\"",
                    path.display(),
                    CLOUD_CONFIG_HEADER
                ),
            }],
        }
        .into());
    }

    let config = parse_document(&content).map_err(|e| SchemaValidationError {
        issues: vec![SchemaIssue {
            key: "format".to_string(),
            message: format!("File {} is not valid yaml. {}", path.display(), e),
        }],
    })?;

    validate_config(&config, true, log)
}

/// Human readable documentation of the module and its config keys.
pub fn render_doc() -> String {
    let mut out = String::new();
    out.push_str(MODULE.name);
    out.push('\n');
    out.push_str(&"-".repeat(MODULE.name.len()));
    out.push_str(&format!("\n**Summary:** {}\n\n", MODULE.title));
    out.push_str(MODULE.description);
    out.push_str(&format!("\n\n**Internal name:** ``{}``\n", MODULE.id));
    out.push_str(&format!("\n**Module frequency:** {}\n", MODULE.frequency));
    out.push_str(&format!("\n**Supported distros:** {}\n", MODULE.distros.join(", ")));
    out.push_str("\n**Config schema**:\n");
    for key in MODULE.keys {
        out.push_str(&format!(
            "    **{}:** ({}) {}\n\n",
            key.name, key.type_name, key.description
        ));
    }
    out.push_str("**Examples**::\n\n");
    for line in MODULE.example.lines() {
        out.push_str(&format!("    {}\n", line));
    }
    out
}
