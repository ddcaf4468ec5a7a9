//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod archive;
pub mod closure;
pub mod deps;
pub mod doctor;
pub mod search_path;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::core::closure::ClosureBuilder;
use crate::core::config::{Config, Overrides};

/// Options locating the root filesystem
#[derive(Args, Debug, Clone, Default)]
pub struct RootArgs {
    /// Root filesystem directory
    #[arg(short, long, env = "INITRAMFS_WRAP_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Linker configuration path inside the root
    #[arg(long, value_name = "PATH")]
    pub ld_so_conf: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every path the entry points need, sorted
    Closure {
        #[command(flatten)]
        root: RootArgs,

        /// Entry points inside the root (default: from config)
        entries: Vec<PathBuf>,
    },

    /// Archive the closure of the entry points
    Archive {
        #[command(flatten)]
        root: RootArgs,

        /// Archive destination (default: cache directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print the producer records instead of running it
        #[arg(long)]
        dry_run: bool,

        /// Entry points inside the root (default: from config)
        entries: Vec<PathBuf>,
    },

    /// Print the library search path of the root
    SearchPath {
        #[command(flatten)]
        root: RootArgs,
    },

    /// Print the interpreter and needed libraries of one binary
    Deps {
        #[command(flatten)]
        root: RootArgs,

        /// Binary inside the root
        path: PathBuf,
    },

    /// Check system dependencies and configuration
    Doctor {
        #[command(flatten)]
        root: RootArgs,
    },
}

impl Commands {
    /// Execute the command
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        match self {
            Self::Closure { root, entries } => {
                let config = load_config(config_path, root, entries, None)?;
                closure::execute(&config)
            }
            Self::Archive {
                root,
                output,
                dry_run,
                entries,
            } => {
                let config = load_config(config_path, root, entries, output)?;
                archive::execute(&config, dry_run)
            }
            Self::SearchPath { root } => {
                let config = load_config(config_path, root, Vec::new(), None)?;
                search_path::execute(&config)
            }
            Self::Deps { root, path } => {
                let config = load_config(config_path, root, Vec::new(), None)?;
                deps::execute(&config, &path)
            }
            Self::Doctor { root } => {
                let config = load_config(config_path, root, Vec::new(), None)?;
                doctor::execute(&config)
            }
        }
    }
}

/// Load the configuration file and apply command-line values
fn load_config(
    explicit: Option<&Path>,
    root: RootArgs,
    entries: Vec<PathBuf>,
    output: Option<PathBuf>,
) -> Result<Config> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = Config::discover(explicit, &current_dir)?;
    config.apply_overrides(Overrides {
        root: root.root,
        ld_so_conf: root.ld_so_conf,
        entries,
        output,
    })?;
    Ok(config)
}

/// Builder for the configured root, which must be a directory
fn closure_builder(config: &Config) -> Result<ClosureBuilder> {
    let root = config.require_root()?;
    if !root.is_dir() {
        anyhow::bail!("Root directory {} does not exist", root.display());
    }
    Ok(ClosureBuilder::with_options(root, &config.closure_options()))
}
