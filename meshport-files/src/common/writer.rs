use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;

/// Counterpart to `Parseable`: writes the exact little-endian layout that `parse` reads.
pub(crate) trait Emittable {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError>;
}

impl Emittable for u8 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u8(*self)?)
    }
}

impl Emittable for i16 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_i16::<LittleEndian>(*self)?)
    }
}

impl Emittable for u32 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u32::<LittleEndian>(*self)?)
    }
}

impl Emittable for i32 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_i32::<LittleEndian>(*self)?)
    }
}

impl Emittable for i64 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_i64::<LittleEndian>(*self)?)
    }
}

impl Emittable for u64 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u64::<LittleEndian>(*self)?)
    }
}

impl Emittable for f64 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_f64::<LittleEndian>(*self)?)
    }
}

impl Emittable for f32 {
    fn emit<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_f32::<LittleEndian>(*self)?)
    }
}

/// Rounds `len` up to the next multiple of four.
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Writes `data` followed by `fill` bytes up to the next 4-byte boundary.
pub(crate) fn write_padded<W: Write>(wtr: &mut W, data: &[u8], fill: u8) -> Result<(), ParserError> {
    wtr.write_all(data)?;
    for _ in data.len()..padded_len(data.len()) {
        wtr.write_u8(fill)?;
    }
    Ok(())
}
