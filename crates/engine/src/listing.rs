//! Listing output: source lines annotated with address and emitted bytes.
//!
//! Lines are collected during assembly (and cleared at each new pass, so
//! only the converged pass survives). The format is the classic one: four
//! hex digits of pc, two spaces, the emitted bytes, the source text starting
//! at column 22 with tabs expanded to 8 columns.

use std::io::{self, Write};

/// One listed line.
#[derive(Debug, Clone)]
pub(crate) struct ListingLine {
    /// pc at the start of the line, when the line had any content.
    pub(crate) pc: Option<u16>,
    /// The bytes the line emitted.
    pub(crate) bytes: Vec<u8>,
    /// Original source text.
    pub(crate) text: String,
}

#[derive(Debug, Default)]
pub(crate) struct Listing {
    lines: Vec<ListingLine>,
}

impl Listing {
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
    }

    pub(crate) fn add(&mut self, line: ListingLine) {
        self.lines.push(line);
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.lines {
            let mut column = 0usize;
            if let Some(pc) = line.pc {
                write!(out, "{pc:04X}  ")?;
                column += 6;
            }
            for byte in &line.bytes {
                write!(out, "{byte:02X}")?;
                column += 2;
            }
            loop {
                write!(out, " ")?;
                column += 1;
                if column >= 22 {
                    break;
                }
            }
            let mut column = 0usize;
            for c in line.text.chars() {
                if c == '\t' {
                    loop {
                        write!(out, " ")?;
                        column += 1;
                        if column % 8 == 0 {
                            break;
                        }
                    }
                } else {
                    write!(out, "{c}")?;
                    column += 1;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_columns() {
        let mut listing = Listing::default();
        listing.add(ListingLine {
            pc: Some(0x4000),
            bytes: vec![0x86, 0x10],
            text: "\tlda\t#$10".to_string(),
        });
        listing.add(ListingLine { pc: None, bytes: Vec::new(), text: "; done".to_string() });

        let mut out = Vec::new();
        listing.write(&mut out).expect("writes");
        let text = String::from_utf8(out).expect("ascii");
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("4000  8610"));
        // Source text starts at column 22; the leading tab expands to 8.
        assert_eq!(&lines[0][22..], "        lda     #$10");
        assert_eq!(lines[1].trim_start(), "; done");
    }
}
