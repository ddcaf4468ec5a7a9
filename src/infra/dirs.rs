//! Platform-specific directory management
//!
//! The default archive output lives in the cache directory. It can be
//! overridden with `INITRAMFS_WRAP_CACHE_DIR`.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the cache directory
pub const ENV_CACHE_DIR: &str = "INITRAMFS_WRAP_CACHE_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "initramfs-wrap";

/// Archive file name inside the cache directory
const ARCHIVE_FILE: &str = "initramfs.cpio";

/// Directory provider for initramfs-wrap
#[derive(Debug, Clone)]
pub struct AppDirs {
    cache_dir: PathBuf,
}

impl AppDirs {
    /// Resolve directories from the environment, then platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: Self::resolve_cache_dir(),
        }
    }

    /// Use an explicit cache directory
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Get the cache directory path
    ///
    /// - Linux: `$XDG_CACHE_HOME/initramfs-wrap` or `~/.cache/initramfs-wrap`
    /// - macOS: `~/Library/Caches/initramfs-wrap`
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Default destination of the archive
    #[must_use]
    pub fn default_archive_path(&self) -> PathBuf {
        self.cache_dir.join(ARCHIVE_FILE)
    }

    fn resolve_cache_dir() -> PathBuf {
        match env::var_os(ENV_CACHE_DIR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::platform_cache_dir(),
        }
    }

    fn platform_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                // Fallback to home directory
                dirs::home_dir()
                    .map(|h| h.join(".cache").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".cache").join(APP_NAME))
            })
    }
}

impl Default for AppDirs {
    fn default() -> Self {
        Self::new()
    }
}
