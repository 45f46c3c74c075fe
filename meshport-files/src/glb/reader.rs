use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian};

use crate::ParserError;
use crate::common::reader::{Parseable, read_exact_vec};
use crate::glb::types::{CHUNK_HEADER_SIZE, ChunkHeader, ChunkType, GLB_HEADER_SIZE, GLB_MAGIC, GLB_VERSION, GlbAsset, GlbHeader};

pub struct GlbReader {}

impl GlbReader {
    /// Cheap sniffing, only looks at the first four bytes.
    pub fn is_glb(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && LittleEndian::read_u32(&bytes[..4]) == GLB_MAGIC
    }

    /// Parses a complete in-memory container and additionally checks that the declared length
    /// matches the buffer exactly.
    pub fn parse_slice(bytes: &[u8]) -> Result<GlbAsset, ParserError> {
        if bytes.len() >= GLB_HEADER_SIZE {
            let declared = LittleEndian::read_u32(&bytes[8..12]) as usize;
            if declared != bytes.len() {
                return Err(ParserError::FormatError {
                    reason: "Declared container length does not match the actual length",
                });
            }
        }

        Self::parse_asset(&mut Cursor::new(bytes))
    }

    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<GlbAsset, ParserError> {
        let header = GlbHeader::parse(rdr)?;
        if header.magic != GLB_MAGIC {
            return Err(ParserError::InvalidMagicValue { magic: header.magic });
        }

        if header.version != GLB_VERSION {
            return Err(ParserError::UnsupportedVersion {
                version: header.version,
            });
        }

        let total = header.length as usize;
        if total < GLB_HEADER_SIZE + CHUNK_HEADER_SIZE || total % 4 != 0 {
            return Err(ParserError::FormatError {
                reason: "Invalid container length",
            });
        }

        let mut remaining = total - GLB_HEADER_SIZE;
        let mut json: Option<Vec<u8>> = None;
        let mut bin: Option<Vec<u8>> = None;

        while remaining > 0 {
            if remaining < CHUNK_HEADER_SIZE {
                return Err(ParserError::FormatError {
                    reason: "Truncated chunk header",
                });
            }

            let chunk = ChunkHeader::parse(rdr)?;
            let length = chunk.length as usize;
            if length % 4 != 0 {
                return Err(ParserError::FormatError {
                    reason: "Chunk length is not a multiple of 4",
                });
            }

            if length > remaining - CHUNK_HEADER_SIZE {
                return Err(ParserError::FormatError {
                    reason: "Chunk exceeds the declared container length",
                });
            }

            let data = read_exact_vec(rdr, length)?;
            remaining -= CHUNK_HEADER_SIZE + length;

            match (chunk.kind(), json.is_some()) {
                (Some(ChunkType::Json), false) => json = Some(data),
                (Some(ChunkType::Json), true) => {
                    return Err(ParserError::FormatError {
                        reason: "Duplicate JSON chunk",
                    });
                }
                (_, false) => {
                    return Err(ParserError::FormatError {
                        reason: "The first chunk has to be the JSON chunk",
                    });
                }
                (Some(ChunkType::Bin), true) if bin.is_none() => bin = Some(data),
                (Some(ChunkType::Bin), true) => {
                    return Err(ParserError::FormatError {
                        reason: "Duplicate BIN chunk",
                    });
                }
                (None, true) => (), // unknown chunk types are skipped
            }
        }

        match json {
            Some(json) => Ok(GlbAsset { header, json, bin }),
            None => Err(ParserError::FormatError {
                reason: "Missing mandatory JSON chunk",
            }),
        }
    }
}
