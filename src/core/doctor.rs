//! Doctor command logic
//!
//! Checks that the archive producer can be run and that the root and its
//! linker configuration are usable, with a suggestion for each failure.

use std::path::Path;

use crate::core::config::Config;
use crate::core::ld_conf::LinkerConfigReader;
use crate::core::path::PathResolver;

/// Result of a single check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the thing being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version or detail if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional check
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check result
    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Count failed checks
    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Get all failed required checks
    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }
}

/// Locate `command` on `PATH` and try to read its version
pub fn check_command_available(command: &str) -> Option<Option<String>> {
    let path = which::which(command).ok()?;
    let version = std::process::Command::new(&path)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            extract_version(&format!("{stdout}{stderr}"))
        });
    Some(version)
}

/// Extract version string from command output
fn extract_version(output: &str) -> Option<String> {
    let version_regex = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok()?;
    version_regex
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check that a program of the producer argv is on `PATH`
pub fn check_program(program: &str, role: &str) -> CheckResult {
    let name = format!("{role} ({program})");
    match check_command_available(program) {
        Some(version) => CheckResult::pass(&name, version, true),
        None => CheckResult::fail(
            &name,
            &format!("{program} not found in PATH"),
            Some(&format!(
                "Install {program} with your package manager or change [archive] in initramfs.toml"
            )),
            true,
        ),
    }
}

/// Check that the root is an existing directory
pub fn check_root(root: Option<&Path>) -> CheckResult {
    const NAME: &str = "Root directory";
    let Some(root) = root else {
        return CheckResult::fail(
            NAME,
            "No root directory configured",
            Some("Pass --root or set `root` in initramfs.toml"),
            true,
        );
    };
    if root.is_dir() {
        CheckResult::pass(NAME, Some(root.display().to_string()), true)
    } else {
        CheckResult::fail(
            NAME,
            &format!("{} is not a directory", root.display()),
            Some("Point --root at an unpacked root filesystem"),
            true,
        )
    }
}

/// Check that the linker configuration inside the root can be read
pub fn check_linker_config(root: &Path, config: &Config) -> CheckResult {
    const NAME: &str = "Linker configuration";
    let resolver = PathResolver::new(root).with_max_symlink_steps(config.limits.max_symlink_steps);
    let reader =
        LinkerConfigReader::new(resolver).with_max_include_depth(config.limits.max_include_depth);

    match reader.read(&config.ld_so_conf) {
        Ok(dirs) => CheckResult::pass(
            NAME,
            Some(format!("{} directories", dirs.len())),
            false,
        ),
        Err(e) => CheckResult::fail(
            NAME,
            &e.to_string(),
            Some("Statically linked roots need none; otherwise set ld_so_conf in initramfs.toml"),
            false,
        ),
    }
}

/// Run all doctor checks
pub fn run_doctor(config: &Config) -> DoctorReport {
    let mut report = DoctorReport::new();

    if let Some(program) = config.archive.wrapper.first() {
        report.add_check(check_program(program, "Archive wrapper"));
    }
    if let Some(program) = config.archive.command.first() {
        report.add_check(check_program(program, "Archive producer"));
    }

    let root = config.root.as_deref();
    let root_check = check_root(root);
    let root_ok = root_check.passed;
    report.add_check(root_check);

    if let Some(root) = root.filter(|_| root_ok) {
        report.add_check(check_linker_config(root, config));
    }

    report
}
