//! CLI command for `initramfs-wrap archive`
//!
//! Streams the closure to the configured producer, or prints the records
//! it would receive with `--dry-run`.

use std::io::Write;

use anyhow::{Context, Result};

use crate::cli::commands::closure_builder;
use crate::cli::output::{create_spinner, is_json, print_detail, print_success};
use crate::core::config::Config;
use crate::infra::archive::{archive_closure, default_output, CommandSink, MemorySink};

/// Execute the archive command
pub fn execute(config: &Config, dry_run: bool) -> Result<()> {
    let builder = closure_builder(config)?;
    let argv = config.archive.argv();

    if dry_run {
        let spinner = create_spinner("Computing closure...");
        let result = archive_closure(&builder, &config.entries, || Ok(MemorySink::new()));
        spinner.finish_and_clear();
        let (sink, _) = result.with_context(|| {
            format!("Failed to archive closure in {}", builder.root().display())
        })?;

        if is_json() {
            let json_result = serde_json::json!({
                "status": "success",
                "dry_run": true,
                "command": argv,
                "records": sink.records(),
            });
            println!("{}", serde_json::to_string_pretty(&json_result)?);
        } else {
            std::io::stdout()
                .write_all(sink.bytes())
                .context("Failed to write records")?;
        }
        return Ok(());
    }

    let output = default_output(config.archive.output.as_deref());
    let spinner = create_spinner("Archiving closure...");
    let result = archive_closure(&builder, &config.entries, || {
        CommandSink::spawn(&argv, builder.root(), &output)
    });
    spinner.finish_and_clear();
    let (_, written) =
        result.with_context(|| format!("Failed to write archive {}", output.display()))?;

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "dry_run": false,
            "command": argv,
            "output": output,
            "records": written,
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);
        return Ok(());
    }

    print_success(&format!("Archived {written} entries"));
    print_detail(&format!("Output: {}", output.display()));
    Ok(())
}
