//! CLI command for `initramfs-wrap closure`

use anyhow::{Context, Result};

use crate::cli::commands::closure_builder;
use crate::cli::output::{create_spinner, is_json};
use crate::core::closure::Closure;
use crate::core::config::Config;

/// Compute the closure of the configured entries behind a spinner
fn compute(config: &Config) -> Result<Closure> {
    let builder = closure_builder(config)?;
    let spinner = create_spinner("Computing closure...");
    let result = builder.build(&config.entries);
    spinner.finish_and_clear();
    result.with_context(|| {
        format!(
            "Failed to compute closure in {}",
            builder.root().display()
        )
    })
}

/// Execute the closure command
pub fn execute(config: &Config) -> Result<()> {
    let closure = compute(config)?;

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "root": config.root,
            "entries": config.entries,
            "count": closure.len(),
            "paths": closure,
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);
        return Ok(());
    }

    for path in &closure {
        println!("{}", path.display());
    }
    Ok(())
}
