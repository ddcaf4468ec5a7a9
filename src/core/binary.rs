//! Binary dependency extraction
//!
//! Reads the program interpreter and the `DT_NEEDED` library names of an ELF
//! file. Only the program header table is consulted, so binaries stripped of
//! their section headers are handled the same way the dynamic loader sees them.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use elf::abi::{DT_NEEDED, DT_STRSZ, DT_STRTAB, PT_DYNAMIC, PT_INTERP, PT_LOAD};
use elf::dynamic::Dyn;
use elf::endian::AnyEndian;
use elf::parse::ParseError;
use elf::segment::ProgramHeader;
use elf::string_table::StringTable;
use elf::ElfBytes;
use serde::Serialize;

use crate::core::path::host_path;
use crate::error::ClosureError;

/// ELF magic bytes
const ELF_MAGIC: &[u8] = &[0x7f, b'E', b'L', b'F'];

/// Runtime requirements of one binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    /// Program interpreter (dynamic loader), if any
    pub interpreter: Option<PathBuf>,
    /// Needed library names in declaration order
    pub needed: Vec<String>,
}

impl DependencyInfo {
    /// Whether the binary needs nothing at load time
    pub fn is_static(&self) -> bool {
        self.interpreter.is_none() && self.needed.is_empty()
    }
}

/// Program header entries this reader cares about
enum Segment<'data> {
    Interpreter(&'data [u8]),
    Dynamic,
    Load(ProgramHeader),
    Other,
}

impl<'data> Segment<'data> {
    fn decode(file: &ElfBytes<'data, AnyEndian>, phdr: ProgramHeader) -> Result<Self, ParseError> {
        Ok(match phdr.p_type {
            PT_INTERP => Self::Interpreter(file.segment_data(&phdr)?),
            PT_DYNAMIC => Self::Dynamic,
            PT_LOAD => Self::Load(phdr),
            _ => Self::Other,
        })
    }
}

/// Dynamic section entries this reader cares about
enum DynamicEntry {
    Needed(u64),
    StrTab(u64),
    StrSz(u64),
    Other,
}

impl DynamicEntry {
    fn decode(entry: Dyn) -> Self {
        match entry.d_tag {
            DT_NEEDED => Self::Needed(entry.d_val()),
            DT_STRTAB => Self::StrTab(entry.d_ptr()),
            DT_STRSZ => Self::StrSz(entry.d_val()),
            _ => Self::Other,
        }
    }
}

/// Reads dependency information from binaries inside a confined root
#[derive(Debug, Clone)]
pub struct BinaryDependencyReader {
    root: PathBuf,
}

impl BinaryDependencyReader {
    /// Create a reader for binaries under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read the dependencies of the canonical root-relative `path`.
    ///
    /// Returns [`ClosureError::NotABinary`] for anything that is not an ELF
    /// regular file.
    pub fn read(&self, path: &Path) -> Result<DependencyInfo, ClosureError> {
        let host = host_path(&self.root, path);
        let metadata = fs::metadata(&host).map_err(|e| ClosureError::io(path, e))?;
        if !metadata.is_file() {
            return Err(ClosureError::NotABinary {
                path: path.to_path_buf(),
            });
        }

        let data = fs::read(&host).map_err(|e| ClosureError::io(path, e))?;
        parse_dependencies(path, &data)
    }
}

/// Extract dependency information from the raw bytes of `path`
pub fn parse_dependencies(path: &Path, data: &[u8]) -> Result<DependencyInfo, ClosureError> {
    if !data.starts_with(ELF_MAGIC) {
        return Err(ClosureError::NotABinary {
            path: path.to_path_buf(),
        });
    }

    let malformed = |reason: String| ClosureError::MalformedBinary {
        path: path.to_path_buf(),
        reason,
    };

    let file =
        ElfBytes::<AnyEndian>::minimal_parse(data).map_err(|e| malformed(e.to_string()))?;

    let mut info = DependencyInfo::default();
    let Some(segments) = file.segments() else {
        return Ok(info);
    };

    let mut loads = Vec::new();
    let mut has_dynamic = false;
    for phdr in segments.iter() {
        match Segment::decode(&file, phdr).map_err(|e| malformed(e.to_string()))? {
            Segment::Interpreter(bytes) => {
                info.interpreter = Some(interpreter_path(bytes).ok_or_else(|| {
                    malformed("PT_INTERP segment holds an empty path".to_string())
                })?);
            }
            Segment::Dynamic => has_dynamic = true,
            Segment::Load(phdr) => loads.push(phdr),
            Segment::Other => {}
        }
    }

    if has_dynamic {
        info.needed = needed_libraries(&file, data, &loads).map_err(malformed)?;
    }

    tracing::debug!(
        "{}: interpreter {:?}, needed {:?}",
        path.display(),
        info.interpreter,
        info.needed
    );
    Ok(info)
}

fn interpreter_path(bytes: &[u8]) -> Option<PathBuf> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let raw = &bytes[..end];
    (!raw.is_empty()).then(|| PathBuf::from(OsStr::from_bytes(raw)))
}

fn needed_libraries(
    file: &ElfBytes<'_, AnyEndian>,
    data: &[u8],
    loads: &[ProgramHeader],
) -> Result<Vec<String>, String> {
    let Some(table) = file.dynamic().map_err(|e| e.to_string())? else {
        return Err("PT_DYNAMIC segment present but unreadable".to_string());
    };

    let mut name_offsets = Vec::new();
    let mut strtab_addr = None;
    let mut strtab_size = None;
    for entry in table.iter() {
        match DynamicEntry::decode(entry) {
            DynamicEntry::Needed(offset) => name_offsets.push(offset),
            DynamicEntry::StrTab(addr) => strtab_addr = Some(addr),
            DynamicEntry::StrSz(size) => strtab_size = Some(size),
            DynamicEntry::Other => {}
        }
    }

    if name_offsets.is_empty() {
        return Ok(Vec::new());
    }

    let addr = strtab_addr.ok_or("DT_NEEDED entries without DT_STRTAB")?;
    let start = file_offset(loads, addr)
        .and_then(|offset| usize::try_from(offset).ok())
        .filter(|&start| start <= data.len())
        .ok_or_else(|| format!("DT_STRTAB address {addr:#x} is not mapped by any PT_LOAD"))?;
    let end = match strtab_size {
        Some(size) => usize::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .filter(|&end| end <= data.len())
            .ok_or_else(|| format!("DT_STRSZ {size} runs past the end of the file"))?,
        None => data.len(),
    };
    let strtab = StringTable::new(&data[start..end]);

    name_offsets
        .into_iter()
        .map(|offset| {
            usize::try_from(offset)
                .map_err(|e| e.to_string())
                .and_then(|offset| strtab.get(offset).map_err(|e| e.to_string()))
                .map(str::to_string)
        })
        .collect()
}

/// Translate a virtual address into a file offset through the loadable segments
fn file_offset(loads: &[ProgramHeader], addr: u64) -> Option<u64> {
    loads.iter().find_map(|phdr| {
        let delta = addr.checked_sub(phdr.p_vaddr)?;
        if delta >= phdr.p_filesz {
            return None;
        }
        phdr.p_offset.checked_add(delta)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{ElfImage, RootFixture};

    #[test]
    fn test_dynamic_executable() {
        let image = ElfImage::executable()
            .interpreter("/lib64/ld-linux-x86-64.so.2")
            .needs("libtinfo.so.6")
            .needs("libc.so.6")
            .build();

        let info = parse_dependencies(Path::new("/bin/bash"), &image).unwrap();
        assert_eq!(
            info.interpreter,
            Some(PathBuf::from("/lib64/ld-linux-x86-64.so.2"))
        );
        assert_eq!(info.needed, vec!["libtinfo.so.6", "libc.so.6"]);
        assert!(!info.is_static());
    }

    #[test]
    fn test_shared_library_without_interpreter() {
        let image = ElfImage::shared_library().needs("libc.so.6").build();

        let info = parse_dependencies(Path::new("/lib/libm.so.6"), &image).unwrap();
        assert_eq!(info.interpreter, None);
        assert_eq!(info.needed, vec!["libc.so.6"]);
    }

    #[test]
    fn test_elf32_executable() {
        let image = ElfImage::executable()
            .elf32()
            .interpreter("/lib/ld-linux.so.2")
            .needs("libc.so.6")
            .build();

        let info = parse_dependencies(Path::new("/bin/sh"), &image).unwrap();
        assert_eq!(info.interpreter, Some(PathBuf::from("/lib/ld-linux.so.2")));
        assert_eq!(info.needed, vec!["libc.so.6"]);
    }

    #[test]
    fn test_big_endian_elf64_executable() {
        let image = ElfImage::executable()
            .big_endian()
            .interpreter("/lib64/ld64.so.1")
            .needs("libm.so.6")
            .needs("libc.so.6")
            .build();

        let info = parse_dependencies(Path::new("/bin/awk"), &image).unwrap();
        assert_eq!(info.interpreter, Some(PathBuf::from("/lib64/ld64.so.1")));
        assert_eq!(info.needed, vec!["libm.so.6", "libc.so.6"]);
    }

    #[test]
    fn test_big_endian_elf32_library() {
        let image = ElfImage::shared_library()
            .elf32()
            .big_endian()
            .needs("libc.so.6")
            .build();

        let info = parse_dependencies(Path::new("/lib/libz.so.1"), &image).unwrap();
        assert_eq!(info.interpreter, None);
        assert_eq!(info.needed, vec!["libc.so.6"]);
    }

    #[test]
    fn test_static_binary_is_a_leaf() {
        let image = ElfImage::static_executable().build();

        let info = parse_dependencies(Path::new("/bin/busybox"), &image).unwrap();
        assert!(info.is_static());
        assert!(info.needed.is_empty());
    }

    #[test]
    fn test_script_is_not_a_binary() {
        let err = parse_dependencies(Path::new("/usr/bin/ldd"), b"#!/bin/sh\necho\n").unwrap_err();
        assert!(matches!(err, ClosureError::NotABinary { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_truncated_elf_is_malformed() {
        let image = ElfImage::executable().needs("libc.so.6").build();

        let err = parse_dependencies(Path::new("/bin/cut"), &image[..24]).unwrap_err();
        assert!(matches!(err, ClosureError::MalformedBinary { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_needed_without_string_table_is_malformed() {
        let image = ElfImage::executable()
            .needs("libc.so.6")
            .without_string_table()
            .build();

        let err = parse_dependencies(Path::new("/bin/cut"), &image).unwrap_err();
        assert!(matches!(err, ClosureError::MalformedBinary { .. }));
    }

    #[test]
    fn test_load_offset_overflow_is_malformed() {
        let image = ElfImage::executable()
            .needs("libc.so.6")
            .load_offset(u64::MAX)
            .build();

        let err = parse_dependencies(Path::new("/bin/corrupt"), &image).unwrap_err();
        assert!(matches!(err, ClosureError::MalformedBinary { .. }));
    }

    #[test]
    fn test_read_from_root() {
        let root = RootFixture::new();
        root.elf("/bin/dash", &ElfImage::executable().needs("libc.so.6"));
        root.file("/etc/motd", "hello");
        root.dir("/var/empty");

        let reader = BinaryDependencyReader::new(root.path());
        assert_eq!(
            reader.read(Path::new("/bin/dash")).unwrap().needed,
            vec!["libc.so.6"]
        );
        assert!(matches!(
            reader.read(Path::new("/etc/motd")),
            Err(ClosureError::NotABinary { .. })
        ));
        assert!(matches!(
            reader.read(Path::new("/var/empty")),
            Err(ClosureError::NotABinary { .. })
        ));
        assert!(matches!(
            reader.read(Path::new("/bin/missing")),
            Err(ClosureError::Io { .. })
        ));
    }
}
