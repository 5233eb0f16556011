//! CoCo RSDOS segmented binary: one preamble per segment, optional exec
//! postamble.
//!
//! Each segment is written as `00 SIZE_H SIZE_L PUT_H PUT_L <bytes>`; when an
//! exec address is given the file ends with `FF 00 00 EXEC_H EXEC_L`.

use std::io;

use crate::{Error, Image};

pub(crate) fn write<W: io::Write>(
    image: &Image,
    exec: Option<u16>,
    out: &mut W,
) -> Result<(), Error> {
    for segment in &image.segments {
        let put = segment.put;
        let size = segment.data.len() as u16;
        out.write_all(&[0x00, (size >> 8) as u8, size as u8, (put >> 8) as u8, put as u8])?;
        out.write_all(&segment.data)?;
    }
    if let Some(exec) = exec {
        out.write_all(&[0xff, 0x00, 0x00, (exec >> 8) as u8, exec as u8])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Segment;

    #[test]
    fn test_segment_preambles_and_postamble() {
        let image = Image {
            segments: vec![
                Segment { put: 0x4000, data: vec![0x86, 0x10] },
                Segment { put: 0x6000, data: vec![0x39] },
            ],
        };
        let mut out = Vec::new();
        write(&image, Some(0x4000), &mut out).expect("writes");
        assert_eq!(
            out,
            [
                0x00, 0x00, 0x02, 0x40, 0x00, 0x86, 0x10, // first segment
                0x00, 0x00, 0x01, 0x60, 0x00, 0x39, // second segment
                0xff, 0x00, 0x00, 0x40, 0x00, // exec postamble
            ]
        );
    }

    #[test]
    fn test_no_postamble_without_exec() {
        let image = Image {
            segments: vec![Segment { put: 0, data: vec![0x12] }],
        };
        let mut out = Vec::new();
        write(&image, None, &mut out).expect("writes");
        assert_eq!(out, [0x00, 0x00, 0x01, 0x00, 0x00, 0x12]);
    }
}
