//! Closure computation
//!
//! Turns a handful of entry points into every path that must exist inside the
//! root for them to run: the entries themselves, every directory and symbolic
//! link on the way to them, their program interpreters and, transitively, the
//! shared libraries they need.
//!
//! The traversal is depth-first over an explicit work stack with a visited set
//! shared by the whole build, so dependency cycles and diamonds are processed
//! exactly once.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::binary::{BinaryDependencyReader, DependencyInfo};
use crate::core::ld_conf::{LinkerConfigReader, DEFAULT_LD_SO_CONF, DEFAULT_MAX_INCLUDE_DEPTH};
use crate::core::library::LibraryResolver;
use crate::core::path::{PathResolver, DEFAULT_MAX_SYMLINK_STEPS};
use crate::error::ClosureError;

/// Tunables of a closure build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureOptions {
    /// Linker configuration file inside the root
    pub ld_so_conf: PathBuf,
    /// Symbolic links followed per path before giving up
    pub max_symlink_steps: usize,
    /// Nested `include` directives allowed in the linker configuration
    pub max_include_depth: usize,
}

impl Default for ClosureOptions {
    fn default() -> Self {
        Self {
            ld_so_conf: PathBuf::from(DEFAULT_LD_SO_CONF),
            max_symlink_steps: DEFAULT_MAX_SYMLINK_STEPS,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// The set of root-relative paths required by a set of entry points
///
/// Iteration order is sorted and deterministic, parents before children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Closure {
    paths: BTreeSet<PathBuf>,
}

impl Closure {
    /// Number of paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the closure holds no paths
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether `path` is a member
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.paths.contains(path.as_ref())
    }

    /// Paths in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

impl<'a> IntoIterator for &'a Closure {
    type Item = &'a PathBuf;
    type IntoIter = std::collections::btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// A path waiting to be processed
struct Pending {
    path: PathBuf,
    needed_by: Option<PathBuf>,
}

/// Computes closures inside one confined root
#[derive(Debug, Clone)]
pub struct ClosureBuilder {
    resolver: PathResolver,
    binaries: BinaryDependencyReader,
    libraries: LibraryResolver,
    linker_config: LinkerConfigReader,
    ld_so_conf: PathBuf,
}

impl ClosureBuilder {
    /// Create a builder for `root` with default options
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, &ClosureOptions::default())
    }

    /// Create a builder for `root`
    pub fn with_options(root: impl Into<PathBuf>, options: &ClosureOptions) -> Self {
        let root = root.into();
        let resolver =
            PathResolver::new(&root).with_max_symlink_steps(options.max_symlink_steps);
        Self {
            binaries: BinaryDependencyReader::new(&root),
            libraries: LibraryResolver::new(resolver.clone()),
            linker_config: LinkerConfigReader::new(resolver.clone())
                .with_max_include_depth(options.max_include_depth),
            ld_so_conf: options.ld_so_conf.clone(),
            resolver,
        }
    }

    /// The confined root
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// The flattened library search path list of the root
    pub fn search_paths(&self) -> Result<Vec<String>, ClosureError> {
        self.linker_config.read(&self.ld_so_conf)
    }

    /// Read the dependencies of a single binary inside the root
    pub fn dependencies(&self, path: &Path) -> Result<DependencyInfo, ClosureError> {
        let resolved = self.resolver.canonicalize(path)?;
        self.binaries.read(&resolved)
    }

    /// Compute the closure of `entries`.
    ///
    /// Fails on the first fatal error; no partial closure is returned. The
    /// search path list is read at most once, and only if some binary needs a
    /// library.
    pub fn build<P: AsRef<Path>>(&self, entries: &[P]) -> Result<Closure, ClosureError> {
        let root = PathBuf::from("/");
        let mut paths = BTreeSet::from([root.clone()]);
        let mut visited = HashSet::from([root]);
        let mut search_paths: Option<Vec<String>> = None;

        let mut pending: Vec<Pending> = entries
            .iter()
            .rev()
            .map(|entry| Pending {
                path: entry.as_ref().to_path_buf(),
                needed_by: None,
            })
            .collect();

        while let Some(Pending { path, needed_by }) = pending.pop() {
            if visited.contains(&path) {
                continue;
            }

            let resolved = self.resolver.resolve(&path, &mut paths)?;
            if !visited.insert(resolved.clone()) {
                continue;
            }

            let info = match self.binaries.read(&resolved) {
                Ok(info) => info,
                Err(ClosureError::NotABinary { .. }) => {
                    if let Some(parent) = &needed_by {
                        tracing::warn!(
                            "{} needed by {} is not an ELF binary",
                            resolved.display(),
                            parent.display()
                        );
                    } else {
                        tracing::debug!("{} is not an ELF binary", resolved.display());
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut next = Vec::with_capacity(info.needed.len() + 1);
            if let Some(interpreter) = info.interpreter {
                next.push(interpreter);
            }
            if !info.needed.is_empty() {
                if search_paths.is_none() {
                    let dirs = self.search_paths()?;
                    tracing::debug!("Library search path: {dirs:?}");
                    search_paths = Some(dirs);
                }
                let dirs = search_paths.as_deref().unwrap_or_default();
                for name in &info.needed {
                    next.push(self.libraries.resolve(name, &resolved, dirs)?);
                }
            }

            pending.extend(
                next.into_iter()
                    .rev()
                    .filter(|dep| !visited.contains(dep))
                    .map(|dep| Pending {
                        path: dep,
                        needed_by: Some(resolved.clone()),
                    }),
            );
        }

        tracing::info!(
            "Closure of {} entries in {}: {} paths",
            entries.len(),
            self.root().display(),
            paths.len()
        );
        Ok(Closure { paths })
    }
}
