//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a root
//! filesystem fixture, the synthetic ELF builder shared with the unit tests
//! and a binary runner.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_fs::prelude::*;
use assert_fs::TempDir;

pub const LD_SO: &str = "/lib64/ld-linux-x86-64.so.2";
pub const LIBDIR: &str = "/lib/x86_64-linux-gnu";

#[path = "../../src/test_utils/elf_image.rs"]
mod elf_image;

pub use elf_image::ElfImage;

/// Root filesystem fixture in a temporary directory
pub struct TestRoot {
    pub dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// A small Debian-like root: `/bin/sh` links to dash, which needs libc
    pub fn debian_like() -> Self {
        let root = Self::new();
        root.elf("/bin/dash", &ElfImage::executable().interpreter(LD_SO).needs("libc.so.6"));
        root.link("/bin/sh", "dash");
        root.elf(LD_SO, &ElfImage::shared_library());
        root.elf(
            &format!("{LIBDIR}/libc.so.6"),
            &ElfImage::shared_library().needs("ld-linux-x86-64.so.2"),
        );
        root.link(&format!("{LIBDIR}/ld-linux-x86-64.so.2"), LD_SO);
        root.file("/etc/ld.so.conf", "include /etc/ld.so.conf.d/*.conf\n");
        root.file("/etc/ld.so.conf.d/x86_64-linux-gnu.conf", &format!("# multiarch\n{LIBDIR}\n"));
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.dir.child(path.trim_start_matches('/'))
    }

    pub fn file(&self, path: &str, content: &str) {
        self.child(path).write_str(content).expect("Failed to write file");
    }

    pub fn elf(&self, path: &str, image: &ElfImage) {
        self.child(path)
            .write_binary(&image.build())
            .expect("Failed to write ELF image");
    }

    pub fn link(&self, path: &str, target: &str) {
        let child = self.child(path);
        if let Some(parent) = child.path().parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        child.symlink_to_file(target).expect("Failed to create symlink");
    }

    pub fn host(&self, path: &str) -> PathBuf {
        self.child(path).path().to_path_buf()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the binary in `cwd` with `args`
pub fn run_in(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_initramfs-wrap"))
        .current_dir(cwd)
        .env_remove("INITRAMFS_WRAP_ROOT")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute initramfs-wrap")
}

/// Run the binary against `root` with `--root` appended after `args`
pub fn run_with_root(root: &TestRoot, args: &[&str]) -> Output {
    let root_arg = root.path().to_string_lossy().to_string();
    let mut full: Vec<&str> = args.to_vec();
    full.push("--root");
    full.push(&root_arg);
    run_in(root.path(), &full)
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
