//! Infrastructure layer
//!
//! Handles the side effects: the archive producer process and
//! platform directories.

pub mod archive;
pub mod dirs;
