//! CLI command for `initramfs-wrap doctor`
//!
//! Checks the archive producer and the root, and reports issues with
//! suggestions.

use anyhow::Result;

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_success, print_warning, status,
};
use crate::core::config::Config;
use crate::core::doctor::run_doctor;

/// Execute the doctor command
pub fn execute(config: &Config) -> Result<()> {
    let report = run_doctor(config);

    // JSON output mode
    if is_json() {
        let overall = if report.all_passed() {
            "success"
        } else if report.failed_required().is_empty() {
            "warning"
        } else {
            "error"
        };
        let checks: Vec<_> = report
            .checks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "passed": c.passed,
                    "required": c.required,
                    "version": c.version,
                    "error": c.error,
                    "suggestion": c.suggestion,
                })
            })
            .collect();
        let json_result = serde_json::json!({
            "status": overall,
            "checks": checks,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len(),
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);

        if !report.all_required_passed() {
            return Err(anyhow::anyhow!("Required checks failed"));
        }
        return Ok(());
    }

    // Quiet mode - only show errors
    if is_quiet() {
        let failed_required = report.failed_required();
        if !failed_required.is_empty() {
            for check in failed_required {
                eprintln!("{} Failed: {}", status::ERROR, check.name);
            }
            return Err(anyhow::anyhow!("Required checks failed"));
        }
        return Ok(());
    }

    print_info("Checking archive producer and root...");
    println!();

    for check in &report.checks {
        let version_str = check
            .version
            .as_ref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();

        let required_str = if check.required { "" } else { " [optional]" };

        if check.passed {
            println!("  {} {}{version_str}{required_str}", status::SUCCESS, check.name);
        } else {
            println!("  {} {}{required_str}", status::ERROR, check.name);
            if let Some(error) = &check.error {
                print_detail(&format!("Error: {error}"));
            }
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("Suggestion: {suggestion}"));
            }
        }
    }

    println!();
    let passed = report.passed_count();
    let total = report.checks.len();
    let failed_required = report.failed_required();

    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
    } else if failed_required.is_empty() {
        print_warning(&format!("{passed}/{total} checks passed (optional checks failed)"));
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
        for check in &failed_required {
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("• {}: {suggestion}", check.name));
            }
        }
        return Err(anyhow::anyhow!(
            "Required checks failed. Run 'initramfs-wrap doctor' for details."
        ));
    }

    Ok(())
}
