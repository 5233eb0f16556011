//! DragonDOS binary: a nine-byte load header followed by the payload.
//!
//! Header layout: `55 02 PUT_H PUT_L SIZE_H SIZE_L EXEC_H EXEC_L AA`. When no
//! exec address is given, the load address doubles as the exec address.

use std::io;

use crate::{Error, Image};

pub(crate) fn write<W: io::Write>(
    image: &Image,
    exec: Option<u16>,
    out: &mut W,
) -> Result<(), Error> {
    let segment = image.segments.first().ok_or(Error::Empty)?;
    let put = segment.put;
    let size = segment.data.len() as u16;
    let exec = exec.unwrap_or(put);

    out.write_all(&[
        0x55,
        0x02,
        (put >> 8) as u8,
        put as u8,
        (size >> 8) as u8,
        size as u8,
        (exec >> 8) as u8,
        exec as u8,
        0xaa,
    ])?;
    out.write_all(&segment.data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Segment;

    #[test]
    fn test_header_and_payload() {
        let image = Image {
            segments: vec![Segment { put: 0x4000, data: vec![0x86, 0x10, 0x39] }],
        };
        let mut out = Vec::new();
        write(&image, Some(0x4001), &mut out).expect("writes");
        assert_eq!(
            out,
            [0x55, 0x02, 0x40, 0x00, 0x00, 0x03, 0x40, 0x01, 0xaa, 0x86, 0x10, 0x39]
        );
    }

    #[test]
    fn test_exec_defaults_to_put() {
        let image = Image {
            segments: vec![Segment { put: 0x1234, data: vec![0x39] }],
        };
        let mut out = Vec::new();
        write(&image, None, &mut out).expect("writes");
        assert_eq!(&out[6..8], &[0x12, 0x34]);
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut out = Vec::new();
        assert!(matches!(write(&Image::default(), None, &mut out), Err(Error::Empty)));
    }
}
