//! Path resolution inside a confined root
//!
//! Resolves a path segment by segment as if the root directory were `/`,
//! following symbolic links and recording every path walked through. The
//! intermediate directories and links are archive members too, so the caller
//! receives all of them, not just the final target.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ClosureError;

/// Default bound on symbolic links followed for one path (Linux `MAXSYMLINKS`)
pub const DEFAULT_MAX_SYMLINK_STEPS: usize = 40;

/// Map a root-relative absolute path onto the host filesystem
pub fn host_path(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

/// One unit of pending resolution work
#[derive(Debug)]
enum Segment {
    Parent,
    Name(OsString),
}

/// Push the segments of `path` so that the first one is popped next.
fn push_segments(pending: &mut Vec<Segment>, path: &Path) {
    for component in path.components().rev() {
        match component {
            Component::Normal(name) => pending.push(Segment::Name(name.to_os_string())),
            Component::ParentDir => pending.push(Segment::Parent),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
}

/// Canonicalizes paths against a confined root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    max_symlink_steps: usize,
}

impl PathResolver {
    /// Create a resolver confined to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_symlink_steps: DEFAULT_MAX_SYMLINK_STEPS,
        }
    }

    /// Override the symbolic link bound
    #[must_use]
    pub fn with_max_symlink_steps(mut self, max_symlink_steps: usize) -> Self {
        self.max_symlink_steps = max_symlink_steps;
        self
    }

    /// The confined root on the host filesystem
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of a root-relative path
    pub fn host_path(&self, path: &Path) -> PathBuf {
        host_path(&self.root, path)
    }

    /// Resolve `path` to its canonical form, inserting every traversed path
    /// (directories, intermediate links and the target) into `visited`.
    ///
    /// A relative link target continues from the directory holding the link;
    /// an absolute one restarts from the root.
    pub fn resolve(
        &self,
        path: &Path,
        visited: &mut BTreeSet<PathBuf>,
    ) -> Result<PathBuf, ClosureError> {
        if !path.is_absolute() {
            return Err(ClosureError::InvalidPath {
                path: path.to_path_buf(),
                reason: "path is not absolute".to_string(),
            });
        }

        let mut pending = Vec::new();
        push_segments(&mut pending, path);

        let mut current = PathBuf::from("/");
        let mut steps = 0;

        while let Some(segment) = pending.pop() {
            let name = match segment {
                Segment::Parent => {
                    if !current.pop() {
                        return Err(ClosureError::InvalidPath {
                            path: path.to_path_buf(),
                            reason: "'..' walks above the root".to_string(),
                        });
                    }
                    continue;
                }
                Segment::Name(name) => name,
            };

            current.push(&name);
            visited.insert(current.clone());

            let target = match fs::read_link(self.host_path(&current)) {
                Ok(target) => target,
                // EINVAL: exists but is not a symbolic link
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => continue,
                Err(e) => return Err(ClosureError::io(current, e)),
            };

            steps += 1;
            if steps > self.max_symlink_steps {
                return Err(ClosureError::SymlinkLoop {
                    path: path.to_path_buf(),
                    limit: self.max_symlink_steps,
                });
            }

            tracing::debug!("{} -> {}", current.display(), target.display());

            if target.is_absolute() {
                current = PathBuf::from("/");
            } else {
                current.pop();
            }
            push_segments(&mut pending, &target);
        }

        Ok(current)
    }

    /// Resolve `path` without recording the traversed paths
    pub fn canonicalize(&self, path: &Path) -> Result<PathBuf, ClosureError> {
        self.resolve(path, &mut BTreeSet::new())
    }

    /// Whether `path` names an existing entry once links are followed inside the root
    pub fn exists(&self, path: &Path) -> Result<bool, ClosureError> {
        match self.canonicalize(path) {
            Ok(_) => Ok(true),
            Err(ClosureError::Io { path: failed, source }) if self.is_absent(&failed, &source) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// A lookup of `failed` hit a missing entry or a prefix that is not a directory
    fn is_absent(&self, failed: &Path, error: &io::Error) -> bool {
        if error.kind() == io::ErrorKind::NotFound {
            return true;
        }
        // ENOTDIR: the parent resolved to a regular file
        failed.parent().is_some_and(|parent| {
            fs::symlink_metadata(self.host_path(parent)).is_ok_and(|meta| !meta.is_dir())
        })
    }
}
