//! `asm6809-object` writes assembled images out in the supported object
//! formats: flat binary, DragonDOS, CoCo RSDOS segmented binary, Motorola
//! S-record and Intel HEX.
//!
//! The input is an [`Image`]: the engine's sections coalesced down to a list
//! of [`Segment`]s, each a contiguous run of bytes at a load address. The
//! formats that can only represent one blob (`bin`, `dragondos`) expect the
//! image to have been coalesced *with padding*, leaving at most one segment.

mod binary;
mod coco;
mod dragondos;
mod ihex;
mod srec;

use std::io;

use thiserror::Error as ThisError;

/// A contiguous run of output bytes at a load address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Load ("put") address of the first byte.
    pub put: u16,
    /// The bytes.
    pub data: Vec<u8>,
}

/// An assembled output image: segments in ascending, non-overlapping load
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    /// The segments.
    pub segments: Vec<Segment>,
}

/// Problems while writing an image.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The format cannot carry an exec address.
    #[error("exec address not valid for binary output")]
    ExecAddress,
    /// The format needs at least one segment and the image has none.
    #[error("no assembled data to write")]
    Empty,
    /// The underlying writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The supported output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Flat binary (the default).
    #[default]
    Binary,
    /// DragonDOS binary with load/exec header.
    DragonDos,
    /// TRS-80 Color Computer segmented binary.
    Coco,
    /// Motorola S-record.
    Srec,
    /// Intel HEX.
    IntelHex,
}

impl Format {
    /// Whether the image fed to this format should be gap-padded into a
    /// single blob.
    pub fn wants_padding(self) -> bool {
        matches!(self, Format::Binary | Format::DragonDos)
    }

    /// Writes `image` in this format.
    pub fn write<W: io::Write>(
        self,
        image: &Image,
        exec: Option<u16>,
        out: &mut W,
    ) -> Result<(), Error> {
        match self {
            Format::Binary => binary::write(image, exec, out),
            Format::DragonDos => dragondos::write(image, exec, out),
            Format::Coco => coco::write(image, exec, out),
            Format::Srec => srec::write(image, exec, out),
            Format::IntelHex => ihex::write(image, exec, out),
        }
    }
}

/// Parses the numeric forms of an exec address: `$hex`, `@octal`, `%binary`,
/// `0x…`, `0b…` or decimal. Returns `None` for anything else (the caller may
/// then try a symbol lookup).
pub fn parse_exec_address(text: &str) -> Option<u16> {
    let parsed = if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16)
    } else if let Some(oct) = text.strip_prefix('@') {
        u32::from_str_radix(oct, 8)
    } else if let Some(bin) = text.strip_prefix('%') {
        u32::from_str_radix(bin, 2)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u32::from_str_radix(bin, 2)
    } else if text.starts_with(|c: char| c.is_ascii_digit()) {
        text.parse::<u32>()
    } else {
        return None;
    };
    parsed.ok().map(|value| value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec_address_forms() {
        assert_eq!(parse_exec_address("$4000"), Some(0x4000));
        assert_eq!(parse_exec_address("0x4000"), Some(0x4000));
        assert_eq!(parse_exec_address("@100"), Some(0o100));
        assert_eq!(parse_exec_address("%1010"), Some(0b1010));
        assert_eq!(parse_exec_address("0b1010"), Some(0b1010));
        assert_eq!(parse_exec_address("16384"), Some(16384));
        assert_eq!(parse_exec_address("start"), None);
    }

    #[test]
    fn test_parse_exec_address_truncates_to_16_bits() {
        assert_eq!(parse_exec_address("$14000"), Some(0x4000));
    }
}
