//! Test utilities
//!
//! Root filesystem fixtures, a synthetic ELF image builder and proptest
//! generators shared by the unit tests.

#[cfg(test)]
pub mod elf_image;

#[cfg(test)]
pub mod fixtures {
    use std::fs;
    use std::os::unix::fs::symlink;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    pub use super::elf_image::ElfImage;
    use crate::core::path::host_path;

    /// Temporary directory standing in for a confined root
    pub struct RootFixture {
        dir: TempDir,
    }

    impl RootFixture {
        pub fn new() -> Self {
            Self {
                dir: TempDir::new().expect("Failed to create temp directory"),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        fn host(&self, path: &str) -> PathBuf {
            let host = host_path(self.dir.path(), Path::new(path));
            if let Some(parent) = host.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent directories");
            }
            host
        }

        pub fn file(&self, path: &str, content: &str) {
            fs::write(self.host(path), content).expect("Failed to write file");
        }

        pub fn dir(&self, path: &str) {
            fs::create_dir_all(self.host(path)).expect("Failed to create directory");
        }

        pub fn elf(&self, path: &str, image: &ElfImage) {
            fs::write(self.host(path), image.build()).expect("Failed to write ELF image");
        }

        pub fn link(&self, path: &str, target: &str) {
            symlink(target, self.host(path)).expect("Failed to create symlink");
        }

        pub fn remove(&self, path: &str) {
            fs::remove_file(self.host(path)).expect("Failed to remove file");
        }

        /// Write `/etc/ld.so.conf` listing `dirs`
        pub fn ld_so_conf(&self, dirs: &[&str]) {
            self.file("/etc/ld.so.conf", &format!("{}\n", dirs.join("\n")));
        }
    }

    impl Default for RootFixture {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a shared library file name
    pub fn library_name() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9]{0,10}", 1u32..10).prop_map(|(stem, major)| format!("lib{stem}.so.{major}"))
    }

    /// Generate an absolute library directory inside a root
    pub fn library_dir() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("/lib".to_string()),
            Just("/usr/lib".to_string()),
            Just("/lib/x86_64-linux-gnu".to_string()),
            "/opt/[a-z]{1,8}/lib",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::elf_image::ElfImage;
    use super::generators::*;
    use proptest::prelude::*;

    #[test]
    fn test_elf_image_has_expected_header() {
        let image = ElfImage::executable().needs("libc.so.6").build();
        assert_eq!(&image[..4], b"\x7fELF");
        assert_eq!(image[4], 2);
        assert_eq!(image[5], 1);
        // phnum: PT_LOAD and PT_DYNAMIC
        assert_eq!(u16::from_le_bytes([image[56], image[57]]), 2);
    }

    #[test]
    fn test_elf32_big_endian_header() {
        let image = ElfImage::executable()
            .elf32()
            .big_endian()
            .interpreter("/lib/ld.so.1")
            .build();
        assert_eq!(&image[..4], b"\x7fELF");
        assert_eq!(image[4], 1);
        assert_eq!(image[5], 2);
        // e_ehsize, e_phentsize, e_phnum
        assert_eq!(u16::from_be_bytes([image[40], image[41]]), 52);
        assert_eq!(u16::from_be_bytes([image[42], image[43]]), 32);
        assert_eq!(u16::from_be_bytes([image[44], image[45]]), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_library_name_generator(name in library_name()) {
            prop_assert!(name.starts_with("lib"));
            prop_assert!(name.contains(".so."));
        }

        #[test]
        fn test_library_dir_generator(dir in library_dir()) {
            prop_assert!(dir.starts_with('/'));
            prop_assert!(dir.ends_with("lib") || dir.ends_with("gnu"));
        }
    }
}
