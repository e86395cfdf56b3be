//! Interfaces to the external collaborators the core consumes: binary
//! file loaders and per-architecture instruction decoders.
//!
//! The loaders and decoders themselves live outside this workspace; this
//! crate fixes the traits they implement, the binary format dispatch
//! table, and a minimal front-end handle a program can carry.

pub mod error;
pub mod format;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use relift_core::{Addr, FrontEnd, Program, Rtl, SymTab};

pub use error::LoadError;
pub use format::{detect_format, BinaryFormat};

/// The machine architecture a binary targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Pentium,
    Sparc,
    Ppc,
    St20,
    Hppa,
    Palm,
    M68k,
}

/// A loaded section of the binary image.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub name: String,
    pub native_addr: Addr,
    pub size: u32,
    pub is_code: bool,
    pub is_data: bool,
    pub is_bss: bool,
    pub is_read_only: bool,
}

/// The consumed surface of a binary-file loader.
///
/// One implementation per container format; the dispatch table in
/// [`format`] picks which one a file gets.
pub trait BinaryFile {
    fn machine(&self) -> Machine;
    fn main_entry_point(&self) -> Option<Addr>;
    fn section_by_name(&self, name: &str) -> Option<&SectionInfo>;
    fn is_dynamic_linked_proc(&self, addr: Addr) -> bool;
    fn dynamic_proc_name(&self, addr: Addr) -> Option<String>;

    fn read_native_1(&self, addr: Addr) -> Option<u8>;
    fn read_native_2(&self, addr: Addr) -> Option<u16>;
    fn read_native_4(&self, addr: Addr) -> Option<u32>;
    fn read_native_8(&self, addr: Addr) -> Option<u64>;
    fn read_native_float_4(&self, addr: Addr) -> Option<f32>;
    fn read_native_float_8(&self, addr: Addr) -> Option<f64>;

    /// The symbol table, both directions.
    fn symbols(&self) -> &SymTab;
    /// Shared objects this binary links against.
    fn dependency_list(&self) -> Vec<String>;
}

/// Result of decoding one instruction.
#[derive(Debug)]
pub struct DecodeResult {
    pub rtl: Option<Rtl>,
    pub num_bytes: u32,
    /// The decoder wants the same address decoded again (delay-slot
    /// reshuffling).
    pub re_decode: bool,
    pub valid: bool,
}

/// The consumed surface of a per-architecture instruction decoder.
pub trait Decoder {
    /// Decodes the instruction at `pc`; `delta` maps native addresses to
    /// host offsets in the mapped image.
    fn decode_instruction(&mut self, pc: Addr, delta: isize) -> DecodeResult;

    /// Is this a register-window restore (affects call/return pairing on
    /// some architectures)?
    fn is_restore(&self, _addr: Addr) -> bool {
        false
    }

    /// Human-readable disassembly of the instruction at `pc`.
    fn decode_assembly(&self, pc: Addr, delta: isize) -> Option<String>;
}

/// The minimal front-end handle a program carries: which format claimed
/// the binary and where execution starts.
#[derive(Debug)]
pub struct DetectedFrontEnd {
    format: BinaryFormat,
    entry: Option<Addr>,
}

impl FrontEnd for DetectedFrontEnd {
    fn name(&self) -> &str {
        self.format.name()
    }

    fn entry_point(&self) -> Option<Addr> {
        self.entry
    }
}

/// Statically-registered loader constructors, one slot per format. The
/// core build links no loader implementations; a full build registers
/// its constructors here and dispatch stays table-driven.
static LOADERS: &[(BinaryFormat, Option<fn() -> Box<dyn BinaryFile>>)] = &[
    (BinaryFormat::Elf, None),
    (BinaryFormat::Win32Pe, None),
    (BinaryFormat::DosExe, None),
    (BinaryFormat::Dos4gwLe, None),
    (BinaryFormat::Palm, None),
    (BinaryFormat::MachO, None),
    (BinaryFormat::HpSom, None),
    (BinaryFormat::IntelCoff, None),
];

/// Instantiates the loader registered for `format`.
pub fn instantiate_loader(format: BinaryFormat) -> Result<Box<dyn BinaryFile>, LoadError> {
    LOADERS
        .iter()
        .find(|(f, _)| *f == format)
        .and_then(|(_, ctor)| ctor.as_ref())
        .map(|ctor| ctor())
        .ok_or_else(|| LoadError::LoaderFailed(format!("no loader linked for {}", format.name())))
}

/// Creates a program for the binary at `path`: sniffs the magic, records
/// the detected format as the program's front-end handle. The program's
/// name starts out as the path.
pub fn load_binary(path: &Path) -> Result<Program, LoadError> {
    let mut file = File::open(path)?;
    let mut head = [0u8; 0x100];
    let n = file.read(&mut head)?;
    let format = detect_format(&head[..n])?;

    let path_str = path.display().to_string();
    let mut prog = Program::new(&path_str);
    prog.set_front_end(Box::new(DetectedFrontEnd {
        format,
        entry: None,
    }));
    Ok(prog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_binary_names_program_after_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello");
        let mut f = File::create(&path).unwrap();
        let mut image = vec![0u8; 64];
        image[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        f.write_all(&image).unwrap();

        let prog = load_binary(&path).unwrap();
        assert_eq!(prog.name, path.display().to_string());
        assert_eq!(prog.front_end().unwrap().name(), "ELF");
    }

    #[test]
    fn load_binary_rejects_unknown_magic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("garbage");
        let mut f = File::create(&path).unwrap();
        f.write_all(&[0u8; 64]).unwrap();
        assert!(matches!(
            load_binary(&path),
            Err(LoadError::UnknownMagic)
        ));
    }
}
