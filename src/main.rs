//! initramfs-wrap CLI - Minimal initramfs closure builder
//!
//! Entry point for the initramfs-wrap command-line application.

use clap::Parser;
use tracing::Level;

use initramfs_wrap::cli::output::{display_error, OutputConfig};
use initramfs_wrap::cli::Cli;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    // Logs go to stderr so closure listings on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Apply output configuration globally
    OutputConfig::new(cli.quiet, cli.json).apply_global();

    if let Err(e) = cli.run() {
        display_error(&e);
        std::process::exit(1);
    }
}
