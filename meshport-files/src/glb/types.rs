use meshport_files_derive_parseable::{Emit, Parse};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ParserError;

/// "glTF" read as a little-endian u32
pub const GLB_MAGIC: u32 = 0x46546C67;
pub const GLB_VERSION: u32 = 2;
pub const GLB_HEADER_SIZE: usize = 12;
pub const CHUNK_HEADER_SIZE: usize = 8;

pub const JSON_PADDING: u8 = 0x20;
pub const BIN_PADDING: u8 = 0x00;

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum ChunkType {
    /// "JSON"
    Json = 0x4E4F534A,
    /// "BIN\0"
    Bin = 0x004E4942,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Emit)]
pub struct GlbHeader {
    pub magic: u32,
    pub version: u32,
    /// Total length of the container including this header.
    pub length: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Emit)]
pub struct ChunkHeader {
    /// Length of the chunk data, excluding this header. Always a multiple of 4.
    pub length: u32,
    pub chunk_type: u32,
}

impl ChunkHeader {
    /// `None` for chunk types that readers are required to skip.
    pub fn kind(&self) -> Option<ChunkType> {
        ChunkType::try_from(self.chunk_type).ok()
    }
}

#[derive(Debug, Clone)]
pub struct GlbAsset {
    pub header: GlbHeader,
    /// Raw JSON chunk data, including the trailing space padding.
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

impl GlbAsset {
    /// The JSON payload with its padding stripped.
    pub fn json_payload(&self) -> &[u8] {
        let end = self
            .json
            .iter()
            .rposition(|&b| b != JSON_PADDING && b != 0)
            .map_or(0, |idx| idx + 1);
        &self.json[..end]
    }

    pub fn json_str(&self) -> Result<&str, ParserError> {
        std::str::from_utf8(self.json_payload()).map_err(|_| ParserError::FormatError {
            reason: "JSON chunk is not valid UTF-8",
        })
    }
}
