//! Synthetic ELF images
//!
//! Self-contained so the integration tests under `tests/` can include the
//! same file and write byte-for-byte the same layout.

const BASE_ADDR: u64 = 0x40_0000;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const DT_NULL: u64 = 0;
const DT_NEEDED: u64 = 1;
const DT_STRTAB: u64 = 5;
const DT_STRSZ: u64 = 10;

/// ELF file class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Elf32,
    Elf64,
}

impl Class {
    fn ehdr_size(self) -> usize {
        match self {
            Self::Elf32 => 52,
            Self::Elf64 => 64,
        }
    }

    fn phdr_size(self) -> usize {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 56,
        }
    }

    fn shdr_size(self) -> u16 {
        match self {
            Self::Elf32 => 40,
            Self::Elf64 => 64,
        }
    }

    /// Width of an address; a `Dyn` entry is two of these
    fn word(self) -> usize {
        match self {
            Self::Elf32 => 4,
            Self::Elf64 => 8,
        }
    }
}

/// Builder for minimal ELF images of either class and byte order
#[derive(Debug, Clone)]
pub struct ElfImage {
    class: Class,
    big_endian: bool,
    e_type: u16,
    dynamic: bool,
    string_table: bool,
    load_offset: u64,
    interpreter: Option<String>,
    needed: Vec<String>,
}

impl ElfImage {
    /// Dynamically linked little-endian ELF64 executable
    pub fn executable() -> Self {
        Self {
            class: Class::Elf64,
            big_endian: false,
            e_type: 2,
            dynamic: true,
            string_table: true,
            load_offset: 0,
            interpreter: None,
            needed: Vec::new(),
        }
    }

    /// Shared object
    pub fn shared_library() -> Self {
        Self {
            e_type: 3,
            ..Self::executable()
        }
    }

    /// Executable with no dynamic segment at all
    pub fn static_executable() -> Self {
        Self {
            dynamic: false,
            ..Self::executable()
        }
    }

    pub fn elf32(mut self) -> Self {
        self.class = Class::Elf32;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn interpreter(mut self, path: &str) -> Self {
        self.interpreter = Some(path.to_string());
        self
    }

    pub fn needs(mut self, name: &str) -> Self {
        self.needed.push(name.to_string());
        self
    }

    /// Drop `DT_STRTAB`/`DT_STRSZ` to produce a corrupt image
    pub fn without_string_table(mut self) -> Self {
        self.string_table = false;
        self
    }

    /// Give the `PT_LOAD` segment a bogus file offset, keeping its address
    pub fn load_offset(mut self, offset: u64) -> Self {
        self.load_offset = offset;
        self
    }

    fn machine(&self) -> u16 {
        match (self.class, self.big_endian) {
            (Class::Elf32, false) => 3,  // EM_386
            (Class::Elf32, true) => 20,  // EM_PPC
            (Class::Elf64, false) => 62, // EM_X86_64
            (Class::Elf64, true) => 21,  // EM_PPC64
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let class = self.class;
        let word = class.word();
        let phnum = 1 + usize::from(self.interpreter.is_some()) + usize::from(self.dynamic);

        let mut body = Writer::new(class, self.big_endian);
        let body_start = class.ehdr_size() + phnum * class.phdr_size();

        let interp = self.interpreter.as_ref().map(|path| {
            let offset = body_start + body.bytes.len();
            body.bytes.extend_from_slice(path.as_bytes());
            body.bytes.push(0);
            (offset, path.len() + 1)
        });

        let mut dynstr = vec![0u8];
        let mut name_offsets = Vec::new();
        for name in &self.needed {
            name_offsets.push(dynstr.len() as u64);
            dynstr.extend_from_slice(name.as_bytes());
            dynstr.push(0);
        }

        let dynamic = self.dynamic.then(|| {
            let strtab_offset = body_start + body.bytes.len();
            body.bytes.extend_from_slice(&dynstr);
            while (body_start + body.bytes.len()) % word != 0 {
                body.bytes.push(0);
            }

            let mut entries: Vec<(u64, u64)> =
                name_offsets.iter().map(|&off| (DT_NEEDED, off)).collect();
            if self.string_table {
                entries.push((DT_STRTAB, BASE_ADDR + strtab_offset as u64));
                entries.push((DT_STRSZ, dynstr.len() as u64));
            }
            entries.push((DT_NULL, 0));

            let offset = body_start + body.bytes.len();
            for &(tag, value) in &entries {
                body.word(tag);
                body.word(value);
            }
            (offset, entries.len() * 2 * word)
        });

        let total = (body_start + body.bytes.len()) as u64;
        let mut image = Writer::new(class, self.big_endian);

        let ei_class = match class {
            Class::Elf32 => 1,
            Class::Elf64 => 2,
        };
        let ei_data = if self.big_endian { 2 } else { 1 };
        image
            .bytes
            .extend_from_slice(&[0x7f, b'E', b'L', b'F', ei_class, ei_data, 1, 0]);
        image.bytes.extend_from_slice(&[0; 8]);
        image.u16(self.e_type);
        image.u16(self.machine());
        image.u32(1);
        image.word(BASE_ADDR);
        image.word(class.ehdr_size() as u64);
        image.word(0);
        image.u32(0);
        image.u16(class.ehdr_size() as u16);
        image.u16(class.phdr_size() as u16);
        image.u16(phnum as u16);
        image.u16(class.shdr_size());
        image.u16(0);
        image.u16(0);

        let mut phdr = |p_type: u32, offset: u64, vaddr: u64, size: u64| match class {
            Class::Elf32 => {
                image.u32(p_type);
                image.word(offset);
                image.word(vaddr);
                image.word(vaddr);
                image.word(size);
                image.word(size);
                image.u32(4);
                image.u32(4);
            }
            Class::Elf64 => {
                image.u32(p_type);
                image.u32(4);
                image.word(offset);
                image.word(vaddr);
                image.word(vaddr);
                image.word(size);
                image.word(size);
                image.word(8);
            }
        };

        if let Some((offset, size)) = interp {
            phdr(PT_INTERP, offset as u64, BASE_ADDR + offset as u64, size as u64);
        }
        phdr(PT_LOAD, self.load_offset, BASE_ADDR, total);
        if let Some((offset, size)) = dynamic {
            phdr(PT_DYNAMIC, offset as u64, BASE_ADDR + offset as u64, size as u64);
        }

        image.bytes.extend_from_slice(&body.bytes);
        image.bytes
    }
}

/// Byte sink honouring the image's class and byte order
struct Writer {
    bytes: Vec<u8>,
    class: Class,
    big_endian: bool,
}

impl Writer {
    fn new(class: Class, big_endian: bool) -> Self {
        Self {
            bytes: Vec::new(),
            class,
            big_endian,
        }
    }

    fn u16(&mut self, value: u16) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.bytes.extend_from_slice(&bytes);
    }

    fn u32(&mut self, value: u32) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.bytes.extend_from_slice(&bytes);
    }

    fn u64(&mut self, value: u64) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.bytes.extend_from_slice(&bytes);
    }

    /// Address-sized field
    fn word(&mut self, value: u64) {
        match self.class {
            Class::Elf32 => self.u32(u32::try_from(value).expect("value exceeds an ELF32 word")),
            Class::Elf64 => self.u64(value),
        }
    }
}
