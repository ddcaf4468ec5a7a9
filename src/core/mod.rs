//! Core closure logic
//!
//! Everything here works on paths relative to a confined root directory.
//! Spawning the archive producer belongs in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`path`] - Root-confined path resolution
//! - [`ld_conf`] - `ld.so.conf` parsing
//! - [`binary`] - ELF interpreter and `DT_NEEDED` extraction
//! - [`library`] - Library name lookup in the search path
//! - [`closure`] - Closure computation
//! - [`config`] - Project configuration (`initramfs.toml`)
//! - [`doctor`] - Environment checks

pub mod binary;
pub mod closure;
pub mod config;
pub mod doctor;
pub mod ld_conf;
pub mod library;
pub mod path;
