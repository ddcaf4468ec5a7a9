//! initramfs-wrap - Minimal initramfs closure builder
//!
//! Computes every path inside a root filesystem that a set of entry-point
//! binaries needs at run time (directories, symbolic links, program
//! interpreters and shared libraries) and streams the result to an archive
//! producer such as `cpio`.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Closure computation and configuration
//! - [`infra`] - Archive producer process and platform directories
//! - [`error`] - Error types and handling

pub mod cli;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
