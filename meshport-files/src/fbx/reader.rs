use std::io::{Cursor, Read, Seek, SeekFrom};

use flate2::read::ZlibDecoder;

use crate::ParserError;
use crate::common::reader::{Parseable, read_exact_vec};
use crate::fbx::types::{
    ArrayEncoding, FBX_MAGIC, FBX_MAX_VERSION, FBX_MIN_VERSION, FBX_VERSION_WIDE_OFFSETS, FbxDocument, FbxNode,
    FbxProperty, PropertyType,
};

pub struct FbxReader {}

impl FbxReader {
    pub fn is_binary_fbx(bytes: &[u8]) -> bool {
        bytes.starts_with(FBX_MAGIC)
    }

    pub fn parse_slice(bytes: &[u8]) -> Result<FbxDocument, ParserError> {
        if bytes.is_empty() {
            return Err(ParserError::EmptySource);
        }

        if !Self::is_binary_fbx(bytes) {
            if looks_like_ascii_fbx(bytes) {
                return Err(ParserError::FormatError {
                    reason: "ASCII FBX files are not supported, export as binary FBX",
                });
            }

            let mut magic = [0u8; 4];
            let len = bytes.len().min(4);
            magic[..len].copy_from_slice(&bytes[..len]);
            return Err(ParserError::InvalidMagicValue {
                magic: u32::from_le_bytes(magic),
            });
        }

        let mut rdr = Cursor::new(bytes);
        rdr.seek(SeekFrom::Start(FBX_MAGIC.len() as u64))?;
        let version = u32::parse(&mut rdr)?;
        if !(FBX_MIN_VERSION..=FBX_MAX_VERSION).contains(&version) {
            return Err(ParserError::UnsupportedVersion { version });
        }

        let mut nodes = Vec::new();
        let len = bytes.len() as u64;
        let mut node_reader = NodeReader {
            rdr,
            wide: version >= FBX_VERSION_WIDE_OFFSETS,
            len,
        };

        // The top-level list ends with a null record, followed by a footer we don't need.
        while node_reader.rdr.position() < len {
            match node_reader.read_node()? {
                Some(node) => nodes.push(node),
                None => break,
            }
        }

        Ok(FbxDocument { version, nodes })
    }
}

fn looks_like_ascii_fbx(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    trimmed.starts_with(';') || trimmed.starts_with("FBXHeaderExtension")
}

struct NodeReader<'a> {
    rdr: Cursor<&'a [u8]>,
    wide: bool,
    len: u64,
}

impl NodeReader<'_> {
    fn read_offset(&mut self) -> Result<u64, ParserError> {
        if self.wide {
            u64::parse(&mut self.rdr)
        } else {
            Ok(u32::parse(&mut self.rdr)? as u64)
        }
    }

    /// `None` for the null record terminating a node list.
    fn read_node(&mut self) -> Result<Option<FbxNode>, ParserError> {
        let end_offset = self.read_offset()?;
        let num_properties = self.read_offset()?;
        let _property_list_len = self.read_offset()?;
        let name_len = u8::parse(&mut self.rdr)?;

        if end_offset == 0 {
            return Ok(None);
        }

        if end_offset > self.len || end_offset < self.rdr.position() {
            return Err(ParserError::FormatError {
                reason: "Node end offset is out of bounds",
            });
        }

        let name = String::from_utf8(read_exact_vec(&mut self.rdr, name_len as usize)?)?;

        let mut properties = Vec::new();
        for _ in 0..num_properties {
            properties.push(self.read_property()?);
        }

        let mut children = Vec::new();
        while self.rdr.position() < end_offset {
            match self.read_node()? {
                Some(child) => children.push(child),
                None => break,
            }
        }

        self.rdr.seek(SeekFrom::Start(end_offset))?;
        Ok(Some(FbxNode {
            name,
            properties,
            children,
        }))
    }

    fn read_property(&mut self) -> Result<FbxProperty, ParserError> {
        let code = u8::parse(&mut self.rdr)?;
        let property_type = PropertyType::try_from(code).map_err(|_| ParserError::FormatError {
            reason: "Unknown FBX property type",
        })?;

        Ok(match property_type {
            PropertyType::I16 => FbxProperty::I16(i16::parse(&mut self.rdr)?),
            PropertyType::Bool => FbxProperty::Bool(u8::parse(&mut self.rdr)? & 1 == 1),
            PropertyType::I32 => FbxProperty::I32(i32::parse(&mut self.rdr)?),
            PropertyType::F32 => FbxProperty::F32(f32::parse(&mut self.rdr)?),
            PropertyType::F64 => FbxProperty::F64(f64::parse(&mut self.rdr)?),
            PropertyType::I64 => FbxProperty::I64(i64::parse(&mut self.rdr)?),
            PropertyType::String => {
                let len = self.checked_len()?;
                FbxProperty::String(String::from_utf8(read_exact_vec(&mut self.rdr, len)?)?)
            }
            PropertyType::Raw => {
                let len = self.checked_len()?;
                FbxProperty::Raw(read_exact_vec(&mut self.rdr, len)?)
            }
            PropertyType::F32Array => FbxProperty::F32Array(self.read_array::<f32>(4)?),
            PropertyType::F64Array => FbxProperty::F64Array(self.read_array::<f64>(8)?),
            PropertyType::I64Array => FbxProperty::I64Array(self.read_array::<i64>(8)?),
            PropertyType::I32Array => FbxProperty::I32Array(self.read_array::<i32>(4)?),
            PropertyType::BoolArray => {
                let raw = self.read_array::<u8>(1)?;
                FbxProperty::BoolArray(raw.into_iter().map(|b| b & 1 == 1).collect())
            }
        })
    }

    /// u32 length prefix, checked against the remaining input before allocating.
    fn checked_len(&mut self) -> Result<usize, ParserError> {
        let len = u32::parse(&mut self.rdr)? as u64;
        if len > self.len - self.rdr.position() {
            return Err(ParserError::FormatError {
                reason: "Property length exceeds the file",
            });
        }
        Ok(len as usize)
    }

    fn read_array<T: Parseable<T>>(&mut self, element_size: usize) -> Result<Vec<T>, ParserError> {
        let count = u32::parse(&mut self.rdr)? as usize;
        let encoding = u32::parse(&mut self.rdr)?;
        let compressed_len = self.checked_len()?;
        let encoded = read_exact_vec(&mut self.rdr, compressed_len)?;

        let expected = count.checked_mul(element_size).ok_or(ParserError::FormatError {
            reason: "Array length overflows",
        })?;

        let data = match ArrayEncoding::try_from(encoding) {
            Ok(ArrayEncoding::Raw) => encoded,
            Ok(ArrayEncoding::Zlib) => {
                let mut data = Vec::new();
                ZlibDecoder::new(encoded.as_slice())
                    .take(expected as u64)
                    .read_to_end(&mut data)?;
                data
            }
            Err(_) => {
                return Err(ParserError::FormatError {
                    reason: "Unknown FBX array encoding",
                });
            }
        };

        if data.len() != expected {
            return Err(ParserError::FormatError {
                reason: "FBX array payload does not match its element count",
            });
        }

        let mut cursor = Cursor::new(data);
        (0..count).map(|_| T::parse(&mut cursor)).collect()
    }
}
