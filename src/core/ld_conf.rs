//! Dynamic-linker search path configuration
//!
//! Parses `ld.so.conf` style files into an ordered list of library
//! directories. `include <glob>` lines pull in other files, matches are
//! processed in sorted order. Everything else is taken verbatim as a
//! directory. Order and duplicates are kept as declared.

use std::fs;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::core::path::PathResolver;
use crate::error::ClosureError;

/// Conventional location of the configuration inside the root
pub const DEFAULT_LD_SO_CONF: &str = "/etc/ld.so.conf";

/// Default bound on nested `include` directives
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

const INCLUDE_KEYWORD: &str = "include";

/// Strip a trailing `#` comment and surrounding whitespace
fn strip_line(line: &str) -> &str {
    line.find('#').map_or(line, |idx| &line[..idx]).trim()
}

/// The pattern of an `include` directive, if `line` is one
fn include_pattern(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(INCLUDE_KEYWORD)?;
    rest.starts_with(char::is_whitespace).then_some(rest.trim())
}

fn has_wildcard(name: &str) -> bool {
    name.contains(['*', '?', '['])
}

/// Reads linker search path configuration inside a confined root
#[derive(Debug, Clone)]
pub struct LinkerConfigReader {
    resolver: PathResolver,
    max_include_depth: usize,
}

impl LinkerConfigReader {
    /// Create a reader that opens files through `resolver`
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// Override the include nesting bound
    #[must_use]
    pub fn with_max_include_depth(mut self, max_include_depth: usize) -> Self {
        self.max_include_depth = max_include_depth;
        self
    }

    /// Parse `config` (a path inside the root) and return the flattened list
    pub fn read(&self, config: &Path) -> Result<Vec<String>, ClosureError> {
        let mut dirs = Vec::new();
        self.parse(config, &mut dirs)?;
        Ok(dirs)
    }

    /// Parse `config`, appending its directories to `out`
    pub fn parse(&self, config: &Path, out: &mut Vec<String>) -> Result<(), ClosureError> {
        self.parse_nested(config, out, 0)
    }

    fn parse_nested(
        &self,
        config: &Path,
        out: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), ClosureError> {
        if depth > self.max_include_depth {
            return Err(ClosureError::IncludeDepthExceeded {
                path: config.to_path_buf(),
                limit: self.max_include_depth,
            });
        }

        let canonical = self.resolver.canonicalize(config)?;
        let host = self.resolver.host_path(&canonical);
        let content = fs::read_to_string(&host).map_err(|e| ClosureError::io(config, e))?;

        for line in content.lines() {
            let line = strip_line(line);
            if line.is_empty() {
                continue;
            }

            if let Some(pattern) = include_pattern(line) {
                for included in self.expand(config, pattern)? {
                    tracing::debug!("{}: include {}", config.display(), included.display());
                    self.parse_nested(&included, out, depth + 1)?;
                }
            } else {
                tracing::debug!("{}: search directory {line}", config.display());
                out.push(line.to_string());
            }
        }

        Ok(())
    }

    /// Expand an include pattern into the sorted list of matching files.
    ///
    /// Relative patterns are taken relative to the including file's directory.
    fn expand(&self, config: &Path, pattern: &str) -> Result<Vec<PathBuf>, ClosureError> {
        let pattern_path = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            config.parent().unwrap_or(Path::new("/")).join(pattern)
        };

        let mut base = PathBuf::from("/");
        let mut rest: Vec<String> = Vec::new();
        for component in pattern_path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    if rest.is_empty() && !has_wildcard(&name) {
                        base.push(&*name);
                    } else {
                        rest.push(name.into_owned());
                    }
                }
                Component::ParentDir if rest.is_empty() => {
                    base.pop();
                }
                Component::ParentDir => rest.push("..".to_string()),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        let mut matches = if rest.is_empty() {
            vec![base]
        } else {
            self.walk_matches(config, pattern, &base, &rest)?
        };
        matches.sort();
        matches.dedup();

        let mut files = Vec::with_capacity(matches.len());
        for candidate in matches {
            if self.is_file(&candidate)? {
                files.push(candidate);
            }
        }
        Ok(files)
    }

    fn walk_matches(
        &self,
        config: &Path,
        pattern: &str,
        base: &Path,
        rest: &[String],
    ) -> Result<Vec<PathBuf>, ClosureError> {
        let host_base = match self.resolver.canonicalize(base) {
            Ok(canonical) => self.resolver.host_path(&canonical),
            Err(ClosureError::Io { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        if !host_base.is_dir() {
            return Ok(Vec::new());
        }

        let matcher = GlobBuilder::new(&rest.join("/"))
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| ClosureError::InvalidIncludePattern {
                path: config.to_path_buf(),
                pattern: pattern.to_string(),
                error: e.to_string(),
            })?
            .compile_matcher();

        let found = WalkDir::new(&host_base)
            .min_depth(rest.len())
            .max_depth(rest.len())
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&host_base).ok()?.to_path_buf();
                let visible = relative
                    .components()
                    .zip(rest)
                    .all(|(name, part)| {
                        !name.as_os_str().to_string_lossy().starts_with('.')
                            || part.starts_with('.')
                    });
                (visible && matcher.is_match(&relative)).then(|| base.join(relative))
            })
            .collect();

        Ok(found)
    }

    fn is_file(&self, path: &Path) -> Result<bool, ClosureError> {
        match self.resolver.canonicalize(path) {
            Ok(canonical) => Ok(self.resolver.host_path(&canonical).is_file()),
            Err(ClosureError::Io { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
