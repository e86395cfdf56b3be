//! Binary format detection.
//!
//! A statically-registered table of (magic predicate, format) replaces
//! dynamic loader plugins: each entry inspects the head of the file and
//! claims it or passes. Unknown magic is a hard error -- there is no
//! fallback loader.

use crate::error::LoadError;

/// Binary container formats the front end knows how to ask a loader for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Elf,
    Win32Pe,
    DosExe,
    Dos4gwLe,
    Palm,
    MachO,
    HpSom,
    IntelCoff,
}

impl BinaryFormat {
    pub fn name(self) -> &'static str {
        match self {
            BinaryFormat::Elf => "ELF",
            BinaryFormat::Win32Pe => "Win32 PE",
            BinaryFormat::DosExe => "MS-DOS EXE",
            BinaryFormat::Dos4gwLe => "DOS4GW LE",
            BinaryFormat::Palm => "Palm PRC",
            BinaryFormat::MachO => "Mach-O",
            BinaryFormat::HpSom => "HP-SOM",
            BinaryFormat::IntelCoff => "Intel COFF",
        }
    }
}

struct FormatEntry {
    format: BinaryFormat,
    matches: fn(&[u8]) -> bool,
}

fn magic2(buf: &[u8], off: usize, m: [u8; 2]) -> bool {
    buf.len() >= off + 2 && buf[off..off + 2] == m
}

fn magic4(buf: &[u8], off: usize, m: [u8; 4]) -> bool {
    buf.len() >= off + 4 && buf[off..off + 4] == m
}

fn is_elf(buf: &[u8]) -> bool {
    magic4(buf, 0, [0x7f, b'E', b'L', b'F'])
}

/// DOS-family binaries share the MZ header; the PE/LE variants are told
/// apart by the signature at the offset stored at 0x3c.
fn pe_offset(buf: &[u8]) -> Option<usize> {
    if !magic2(buf, 0, [b'M', b'Z']) {
        return None;
    }
    if buf.len() < 0x40 {
        return None;
    }
    let off = u32::from_le_bytes([buf[0x3c], buf[0x3d], buf[0x3e], buf[0x3f]]) as usize;
    (off != 0).then_some(off)
}

fn is_pe(buf: &[u8]) -> bool {
    pe_offset(buf).is_some_and(|off| magic4(buf, off, [b'P', b'E', 0, 0]))
}

fn is_le(buf: &[u8]) -> bool {
    pe_offset(buf).is_some_and(|off| magic2(buf, off, [b'L', b'E']))
}

fn is_dos_exe(buf: &[u8]) -> bool {
    magic2(buf, 0, [b'M', b'Z'])
}

fn is_palm(buf: &[u8]) -> bool {
    magic4(buf, 0x3c, *b"appl") || magic4(buf, 0x3c, *b"panl")
}

fn is_macho(buf: &[u8]) -> bool {
    magic4(buf, 0, [0xfe, 0xed, 0xfa, 0xce]) || magic4(buf, 0, [0xce, 0xfa, 0xed, 0xfe])
}

/// HP-SOM has weak magic; checked last.
fn is_hp_som(buf: &[u8]) -> bool {
    buf.len() >= 5
        && buf[0] == 0x02
        && buf[2] == 0x01
        && (buf[1] == 0x10 || buf[1] == 0x0b)
        && (buf[3] == 0x07 || buf[3] == 0x08 || buf[4] == 0x0b)
}

fn is_intel_coff(buf: &[u8]) -> bool {
    magic2(buf, 0, [0x4c, 0x01])
}

/// Detection order matters: specific MZ variants before the bare EXE
/// fallback, HP-SOM last.
static FORMATS: &[FormatEntry] = &[
    FormatEntry {
        format: BinaryFormat::Elf,
        matches: is_elf,
    },
    FormatEntry {
        format: BinaryFormat::Win32Pe,
        matches: is_pe,
    },
    FormatEntry {
        format: BinaryFormat::Dos4gwLe,
        matches: is_le,
    },
    FormatEntry {
        format: BinaryFormat::DosExe,
        matches: is_dos_exe,
    },
    FormatEntry {
        format: BinaryFormat::Palm,
        matches: is_palm,
    },
    FormatEntry {
        format: BinaryFormat::MachO,
        matches: is_macho,
    },
    FormatEntry {
        format: BinaryFormat::IntelCoff,
        matches: is_intel_coff,
    },
    FormatEntry {
        format: BinaryFormat::HpSom,
        matches: is_hp_som,
    },
];

/// Detects the binary format from the head of the file.
pub fn detect_format(buf: &[u8]) -> Result<BinaryFormat, LoadError> {
    FORMATS
        .iter()
        .find(|e| (e.matches)(buf))
        .map(|e| e.format)
        .ok_or(LoadError::UnknownMagic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_magic() {
        let mut buf = vec![0u8; 64];
        buf[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::Elf);
    }

    #[test]
    fn pe_magic_via_mz_stub() {
        let mut buf = vec![0u8; 0x100];
        buf[0] = b'M';
        buf[1] = b'Z';
        buf[0x3c] = 0x80;
        buf[0x80..0x84].copy_from_slice(&[b'P', b'E', 0, 0]);
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::Win32Pe);
    }

    #[test]
    fn bare_mz_falls_back_to_dos_exe() {
        let mut buf = vec![0u8; 0x40];
        buf[0] = b'M';
        buf[1] = b'Z';
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::DosExe);
    }

    #[test]
    fn macho_both_endiannesses() {
        let mut buf = vec![0u8; 16];
        buf[..4].copy_from_slice(&[0xfe, 0xed, 0xfa, 0xce]);
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::MachO);
        buf[..4].copy_from_slice(&[0xce, 0xfa, 0xed, 0xfe]);
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::MachO);
    }

    #[test]
    fn palm_magic_at_0x3c() {
        let mut buf = vec![0u8; 0x40];
        buf[0x3c..0x40].copy_from_slice(b"appl");
        assert_eq!(detect_format(&buf).unwrap(), BinaryFormat::Palm);
    }

    #[test]
    fn unknown_magic_is_a_hard_error() {
        let buf = vec![0u8; 64];
        assert!(matches!(detect_format(&buf), Err(LoadError::UnknownMagic)));
        assert!(matches!(detect_format(b"xy"), Err(LoadError::UnknownMagic)));
    }
}
