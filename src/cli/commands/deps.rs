//! CLI command for `initramfs-wrap deps`

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::commands::closure_builder;
use crate::cli::output::{is_json, print_info};
use crate::core::binary::DependencyInfo;
use crate::core::config::Config;
use crate::error::ClosureError;

/// Execute the deps command
pub fn execute(config: &Config, path: &Path) -> Result<()> {
    let builder = closure_builder(config)?;
    let info = match builder.dependencies(path) {
        Ok(info) => Some(info),
        Err(ClosureError::NotABinary { .. }) => None,
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if is_json() {
        let info_ref = info.as_ref();
        let json_result = serde_json::json!({
            "status": "success",
            "path": path,
            "binary": info.is_some(),
            "interpreter": info_ref.and_then(|i| i.interpreter.as_ref()),
            "needed": info_ref.map(|i| i.needed.clone()).unwrap_or_default(),
        });
        println!("{}", serde_json::to_string_pretty(&json_result)?);
        return Ok(());
    }

    match info {
        Some(info) => print_dependencies(&info),
        None => print_info(&format!("{} is not an ELF binary", path.display())),
    }
    Ok(())
}

fn print_dependencies(info: &DependencyInfo) {
    if info.is_static() {
        println!("statically linked");
        return;
    }
    if let Some(interpreter) = &info.interpreter {
        println!("interpreter: {}", interpreter.display());
    }
    for name in &info.needed {
        println!("needed: {name}");
    }
}
