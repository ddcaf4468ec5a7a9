//! Project configuration (`initramfs.toml`)
//!
//! Every field is optional; a missing file behaves like an empty one.
//! Command-line flags are applied on top with [`Config::apply_overrides`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::closure::ClosureOptions;
use crate::core::ld_conf::{DEFAULT_LD_SO_CONF, DEFAULT_MAX_INCLUDE_DEPTH};
use crate::core::path::DEFAULT_MAX_SYMLINK_STEPS;
use crate::error::ConfigError;

/// Configuration file name looked up in the working directory
pub const CONFIG_FILE: &str = "initramfs.toml";

/// Entry points archived when none are configured
pub const DEFAULT_ENTRIES: &[&str] = &["/bin/base64", "/bin/sh", "/bin/tar"];

/// Archive producer reading newline-separated paths on stdin
pub const DEFAULT_ARCHIVE_COMMAND: &[&str] = &["cpio", "-o", "-H", "newc", "-R", "+0:+0"];

/// Project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Confined root directory on the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Entry points, absolute inside the root
    #[serde(default = "default_entries")]
    pub entries: Vec<PathBuf>,

    /// Linker configuration file inside the root
    #[serde(default = "default_ld_so_conf")]
    pub ld_so_conf: PathBuf,

    /// Traversal limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Archive producer settings
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Traversal limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Symbolic links followed per path
    pub max_symlink_steps: usize,

    /// Nested `include` directives in the linker configuration
    pub max_include_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_symlink_steps: DEFAULT_MAX_SYMLINK_STEPS,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Archive producer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Producer argv
    pub command: Vec<String>,

    /// Argv prefix the producer is run under, e.g. `fakeroot`
    pub wrapper: Vec<String>,

    /// Destination file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_ARCHIVE_COMMAND.iter().map(ToString::to_string).collect(),
            wrapper: Vec::new(),
            output: None,
        }
    }
}

impl ArchiveConfig {
    /// Full argv: wrapper followed by the producer command
    pub fn argv(&self) -> Vec<String> {
        self.wrapper.iter().chain(&self.command).cloned().collect()
    }
}

fn default_entries() -> Vec<PathBuf> {
    DEFAULT_ENTRIES.iter().map(PathBuf::from).collect()
}

fn default_ld_so_conf() -> PathBuf {
    PathBuf::from(DEFAULT_LD_SO_CONF)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            entries: default_entries(),
            ld_so_conf: default_ld_so_conf(),
            limits: LimitsConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub ld_so_conf: Option<PathBuf>,
    pub entries: Vec<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Config {
    /// Locate and load the configuration.
    ///
    /// An explicit path must exist. Otherwise `initramfs.toml` in `dir` is
    /// used when present, and the defaults when not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            return Self::load_from_path(path);
        }

        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            Self::load_from_path(&candidate)
        } else {
            tracing::debug!("No {CONFIG_FILE} in {}, using defaults", dir.display());
            Ok(Self::default())
        }
    }

    /// Load and validate the configuration at `path`.
    ///
    /// Relative `root` and `archive.output` are taken relative to the file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.root = config.root.map(|root| base.join(root));
        config.archive.output = config.archive.output.map(|output| base.join(output));

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply command-line values on top of the file
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(root) = overrides.root {
            self.root = Some(root);
        }
        if let Some(ld_so_conf) = overrides.ld_so_conf {
            self.ld_so_conf = ld_so_conf;
        }
        if !overrides.entries.is_empty() {
            self.entries = overrides.entries;
        }
        if let Some(output) = overrides.output {
            self.archive.output = Some(output);
        }
        self.validate()
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(invalid("entries must not be empty"));
        }
        if let Some(entry) = self.entries.iter().find(|entry| !entry.is_absolute()) {
            return Err(invalid(format!(
                "entry '{}' must be an absolute path inside the root",
                entry.display()
            )));
        }
        if !self.ld_so_conf.is_absolute() {
            return Err(invalid(format!(
                "ld_so_conf '{}' must be an absolute path inside the root",
                self.ld_so_conf.display()
            )));
        }
        if self.limits.max_symlink_steps == 0 {
            return Err(invalid("limits.max_symlink_steps must be greater than 0"));
        }
        if self.limits.max_include_depth == 0 {
            return Err(invalid("limits.max_include_depth must be greater than 0"));
        }
        if self.archive.command.is_empty() {
            return Err(invalid("archive.command must not be empty"));
        }
        Ok(())
    }

    /// The configured root, or an error naming how to set one
    pub fn require_root(&self) -> Result<&Path, ConfigError> {
        self.root.as_deref().ok_or_else(|| {
            invalid(format!(
                "no root directory given; pass --root or set `root` in {CONFIG_FILE}"
            ))
        })
    }

    /// Options for [`crate::core::closure::ClosureBuilder`]
    pub fn closure_options(&self) -> ClosureOptions {
        ClosureOptions {
            ld_so_conf: self.ld_so_conf.clone(),
            max_symlink_steps: self.limits.max_symlink_steps,
            max_include_depth: self.limits.max_include_depth,
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
