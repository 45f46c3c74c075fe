use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;

pub(crate) trait Parseable<T> {
    fn parse<R: Read>(rdr: &mut R) -> Result<T, ParserError>;
}

impl Parseable<u8> for u8 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u8, ParserError> {
        Ok(rdr.read_u8()?)
    }
}

impl Parseable<i16> for i16 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i16, ParserError> {
        Ok(rdr.read_i16::<LittleEndian>()?)
    }
}

impl Parseable<i32> for i32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i32, ParserError> {
        Ok(rdr.read_i32::<LittleEndian>()?)
    }
}

impl Parseable<u32> for u32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u32, ParserError> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }
}

impl Parseable<i64> for i64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i64, ParserError> {
        Ok(rdr.read_i64::<LittleEndian>()?)
    }
}

impl Parseable<u64> for u64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u64, ParserError> {
        Ok(rdr.read_u64::<LittleEndian>()?)
    }
}

impl Parseable<f32> for f32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<f32, ParserError> {
        Ok(rdr.read_f32::<LittleEndian>()?)
    }
}

impl Parseable<f64> for f64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<f64, ParserError> {
        Ok(rdr.read_f64::<LittleEndian>()?)
    }
}

/// Reads exactly `len` bytes. A short source surfaces as `IOError(UnexpectedEof)`.
pub(crate) fn read_exact_vec<R: Read>(rdr: &mut R, len: usize) -> Result<Vec<u8>, ParserError> {
    let mut data = vec![0; len];
    rdr.read_exact(&mut data)?;
    Ok(data)
}
