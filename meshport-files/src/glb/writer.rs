use std::io::Write;

use crate::ParserError;
use crate::common::writer::{Emittable, padded_len, write_padded};
use crate::glb::types::{BIN_PADDING, CHUNK_HEADER_SIZE, ChunkHeader, ChunkType, GLB_HEADER_SIZE, GLB_MAGIC, GLB_VERSION, GlbHeader, JSON_PADDING};

pub struct GlbWriter {}

impl GlbWriter {
    /// The exact number of bytes `write_asset` produces. An empty BIN payload is omitted.
    pub fn total_length(json_len: usize, bin_len: Option<usize>) -> usize {
        let mut total = GLB_HEADER_SIZE + CHUNK_HEADER_SIZE + padded_len(json_len);
        if let Some(bin_len) = bin_len.filter(|&len| len > 0) {
            total += CHUNK_HEADER_SIZE + padded_len(bin_len);
        }
        total
    }

    pub fn to_vec(json: &[u8], bin: Option<&[u8]>) -> Result<Vec<u8>, ParserError> {
        let mut out = Vec::with_capacity(Self::total_length(json.len(), bin.map(<[u8]>::len)));
        Self::write_asset(&mut out, json, bin)?;
        Ok(out)
    }

    /// Frames `json` (and `bin`, if non-empty) into a container and returns the bytes written.
    pub fn write_asset<W: Write>(wtr: &mut W, json: &[u8], bin: Option<&[u8]>) -> Result<usize, ParserError> {
        let bin = bin.filter(|data| !data.is_empty());
        let total = Self::total_length(json.len(), bin.map(<[u8]>::len));

        let header = GlbHeader {
            magic: GLB_MAGIC,
            version: GLB_VERSION,
            length: to_u32("Container", total)?,
        };
        header.emit(wtr)?;

        Self::write_chunk(wtr, ChunkType::Json, json, JSON_PADDING)?;
        if let Some(bin) = bin {
            Self::write_chunk(wtr, ChunkType::Bin, bin, BIN_PADDING)?;
        }

        Ok(total)
    }

    fn write_chunk<W: Write>(wtr: &mut W, chunk_type: ChunkType, data: &[u8], fill: u8) -> Result<(), ParserError> {
        let chunk = ChunkHeader {
            length: to_u32("Chunk", padded_len(data.len()))?,
            chunk_type: chunk_type.into(),
        };
        chunk.emit(wtr)?;
        write_padded(wtr, data, fill)
    }
}

fn to_u32(what: &'static str, size: usize) -> Result<u32, ParserError> {
    u32::try_from(size).map_err(|_| ParserError::LengthOverflow { what, size })
}
