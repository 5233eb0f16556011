//! Flat binary output: the raw bytes of the single padded segment.

use std::io;

use crate::{Error, Image};

pub(crate) fn write<W: io::Write>(
    image: &Image,
    exec: Option<u16>,
    out: &mut W,
) -> Result<(), Error> {
    if exec.is_some() {
        return Err(Error::ExecAddress);
    }
    for segment in &image.segments {
        out.write_all(&segment.data)?;
    }
    Ok(())
}
