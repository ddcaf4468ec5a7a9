//! Error types for initramfs-wrap
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while computing a closure
#[derive(Error, Debug)]
pub enum ClosureError {
    /// Path is not absolute, or `..` walked above the root
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Too many symbolic links followed while resolving a path
    #[error("Too many levels of symbolic links resolving '{path}' (limit {limit})")]
    SymlinkLoop { path: PathBuf, limit: usize },

    /// File is not a recognized executable format
    #[error("Not an ELF binary: {path}")]
    NotABinary { path: PathBuf },

    /// File is ELF but its structure is inconsistent
    #[error("Malformed ELF binary '{path}': {reason}")]
    MalformedBinary { path: PathBuf, reason: String },

    /// Needed library is absent from every search directory
    #[error(
        "Library '{name}' needed by '{needed_by}' not found in search path [{}]",
        searched.join(", ")
    )]
    LibraryNotFound {
        name: String,
        needed_by: PathBuf,
        searched: Vec<String>,
    },

    /// Nested `include` directives went deeper than allowed
    #[error("Linker configuration includes nested deeper than {limit} at '{path}'")]
    IncludeDepthExceeded { path: PathBuf, limit: usize },

    /// `include` pattern could not be compiled
    #[error("Invalid include pattern '{pattern}' in '{path}': {error}")]
    InvalidIncludePattern {
        path: PathBuf,
        pattern: String,
        error: String,
    },

    /// Filesystem error
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClosureError {
    /// Whether this error must abort the closure computation
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotABinary { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while handing the closure to the archive producer
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Producer process could not be started
    #[error("Failed to start archive producer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Output file could not be created
    #[error("Failed to create archive output '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the producer's input failed
    #[error("Failed to write to archive producer '{program}': {source}")]
    Write {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the producer failed
    #[error("Failed to wait for archive producer '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Path cannot be expressed as a newline-terminated record
    #[error("Path '{path}' contains a newline and cannot be archived")]
    UnrepresentablePath { path: PathBuf },

    /// Producer exited unsuccessfully
    #[error("Archive producer '{program}' failed after {records} records: {status}")]
    ProducerFailed {
        program: String,
        status: String,
        records: usize,
    },
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Explicitly requested config file does not exist
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Config parsed but a value is unusable
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Top-level initramfs-wrap error type
#[derive(Error, Debug)]
pub enum InitramfsError {
    /// Closure error
    #[error("Closure error: {0}")]
    Closure(#[from] ClosureError),

    /// Archive error
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Config error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
