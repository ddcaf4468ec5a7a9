//! Library name resolution
//!
//! Maps a `DT_NEEDED` name onto the first search directory that holds it.

use std::path::{Path, PathBuf};

use crate::core::path::PathResolver;
use crate::error::ClosureError;

/// Resolves needed library names against an ordered search path list
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    resolver: PathResolver,
}

impl LibraryResolver {
    /// Create a library resolver looking inside `resolver`'s root
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Find `name` in `search_paths`, first match wins.
    ///
    /// The returned path is `directory/name` as listed, not its canonical
    /// form, so that the links leading to it end up in the closure as well.
    pub fn resolve(
        &self,
        name: &str,
        needed_by: &Path,
        search_paths: &[String],
    ) -> Result<PathBuf, ClosureError> {
        for dir in search_paths {
            let candidate = Path::new(dir).join(name);
            if !candidate.is_absolute() {
                tracing::debug!("Skipping relative search directory '{dir}'");
                continue;
            }
            if self.resolver.exists(&candidate)? {
                tracing::debug!("{name} => {}", candidate.display());
                return Ok(candidate);
            }
        }

        Err(ClosureError::LibraryNotFound {
            name: name.to_string(),
            needed_by: needed_by.to_path_buf(),
            searched: search_paths.to_vec(),
        })
    }
}
