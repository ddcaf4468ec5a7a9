//! CLI command for `initramfs-wrap search-path`

use anyhow::{Context, Result};

use crate::cli::commands::closure_builder;
use crate::cli::output::is_json;
use crate::core::config::Config;

/// Execute the search-path command
pub fn execute(config: &Config) -> Result<()> {
    let builder = closure_builder(config)?;
    let dirs = builder
        .search_paths()
        .with_context(|| format!("Failed to read {}", config.ld_so_conf.display()))?;

    if is_json() {
        let json_result = serde_json::json!({
            "status": "success",
            "root": builder.root(),
            "ld_so_conf": config.ld_so_conf,
            "directories": dirs,
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);
        return Ok(());
    }

    for dir in &dirs {
        println!("{dir}");
    }
    Ok(())
}
