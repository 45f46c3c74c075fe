use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use byteorder::{ByteOrder, LittleEndian};

use crate::ParserError;
use crate::glb::reader::GlbReader;
use crate::gltf::types::{Accessor, AccessorType, ComponentType, GltfDocument};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub struct GltfReader {}

impl GltfReader {
    /// Parses a `.gltf` JSON document. Files that actually contain a GLB container are accepted
    /// as well, in that case the JSON chunk is parsed.
    pub fn parse_document(bytes: &[u8]) -> Result<GltfDocument, ParserError> {
        if GlbReader::is_glb(bytes) {
            let asset = GlbReader::parse_slice(bytes)?;
            return Ok(serde_json::from_slice(asset.json_payload())?);
        }

        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ParserError::EmptySource);
        }

        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn write_document(document: &GltfDocument) -> Result<Vec<u8>, ParserError> {
        Ok(serde_json::to_vec(document)?)
    }

    /// `None` if `uri` is not a `data:` URI.
    pub fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>, ParserError>> {
        let rest = uri.strip_prefix("data:")?;
        let Some((media, payload)) = rest.split_once(',') else {
            return Some(Err(ParserError::FormatError {
                reason: "data URI without payload separator",
            }));
        };

        if !media.ends_with(";base64") {
            return Some(Err(ParserError::FormatError {
                reason: "Only base64 encoded data URIs are supported",
            }));
        }

        Some(STANDARD.decode(payload).map_err(|_| ParserError::FormatError {
            reason: "Invalid base64 in data URI",
        }))
    }

    /// Reads an accessor as flat `f32`s, `count * components` values. Normalized integer
    /// components are mapped to `0.0..=1.0` (unsigned) or `-1.0..=1.0` (signed).
    ///
    /// `buffers` holds the resolved bytes of every document buffer, indexed like `document.buffers`.
    pub fn read_floats(document: &GltfDocument, buffers: &[Vec<u8>], accessor_index: usize) -> Result<Vec<f32>, ParserError> {
        let accessor = Self::accessor(document, accessor_index)?;
        let component_type = Self::component_type(accessor)?;

        Self::read_components(document, buffers, accessor, component_type, |raw| {
            decode_float(raw, component_type, accessor.normalized)
        })
    }

    /// Reads a `SCALAR` index accessor of unsigned components.
    pub fn read_indices(document: &GltfDocument, buffers: &[Vec<u8>], accessor_index: usize) -> Result<Vec<u32>, ParserError> {
        let accessor = Self::accessor(document, accessor_index)?;
        if accessor.accessor_type != AccessorType::Scalar {
            return Err(ParserError::FormatError {
                reason: "Index accessor has to be SCALAR",
            });
        }

        let component_type = Self::component_type(accessor)?;
        if !matches!(
            component_type,
            ComponentType::UnsignedByte | ComponentType::UnsignedShort | ComponentType::UnsignedInt
        ) {
            return Err(ParserError::FormatError {
                reason: "Index accessor has to use an unsigned component type",
            });
        }

        Self::read_components(document, buffers, accessor, component_type, |raw| match component_type {
            ComponentType::UnsignedByte => raw[0] as u32,
            ComponentType::UnsignedShort => LittleEndian::read_u16(raw) as u32,
            _ => LittleEndian::read_u32(raw),
        })
    }

    fn accessor(document: &GltfDocument, index: usize) -> Result<&Accessor, ParserError> {
        document.accessors.get(index).ok_or(ParserError::FormatError {
            reason: "Accessor index out of range",
        })
    }

    fn component_type(accessor: &Accessor) -> Result<ComponentType, ParserError> {
        ComponentType::try_from(accessor.component_type).map_err(|_| ParserError::FormatError {
            reason: "Unknown accessor component type",
        })
    }

    /// Validates the accessor's extent against the bytes behind it, then decodes every
    /// component. Nothing is allocated for a count the data cannot back.
    fn read_components<T, F: Fn(&[u8]) -> T>(
        document: &GltfDocument,
        buffers: &[Vec<u8>],
        accessor: &Accessor,
        component_type: ComponentType,
        decode: F,
    ) -> Result<Vec<T>, ParserError> {
        let components = accessor.accessor_type.components();
        let component_size = component_type.size();
        let element_size = components * component_size;

        let values = accessor.count.checked_mul(components).ok_or(ParserError::FormatError {
            reason: "Accessor count overflows",
        })?;

        // Accessors without a buffer view are all zeros (sparse storage is not applied). They
        // may not claim more bytes than the document carries.
        let Some(view_index) = accessor.buffer_view else {
            let available = buffers.iter().map(Vec::len).sum::<usize>();
            if values.checked_mul(component_size).is_none_or(|size| size > available) {
                return Err(ParserError::FormatError {
                    reason: "Accessor without buffer view exceeds the document's buffers",
                });
            }

            let zero = [0u8; 4];
            return Ok((0..values).map(|_| decode(&zero[..component_size])).collect());
        };

        let view = document.buffer_views.get(view_index).ok_or(ParserError::FormatError {
            reason: "Buffer view index out of range",
        })?;
        let buffer = buffers.get(view.buffer).ok_or(ParserError::FormatError {
            reason: "Buffer index out of range",
        })?;

        let view_end = view.byte_offset.checked_add(view.byte_length);
        let view_data = view_end
            .and_then(|end| buffer.get(view.byte_offset..end))
            .ok_or(ParserError::FormatError {
                reason: "Buffer view exceeds its buffer",
            })?;

        let stride = view.byte_stride.unwrap_or(element_size);
        if stride < element_size {
            return Err(ParserError::FormatError {
                reason: "Buffer view stride is smaller than the element",
            });
        }

        if accessor.count == 0 {
            return Ok(Vec::new());
        }

        let last_end = (accessor.count - 1)
            .checked_mul(stride)
            .and_then(|offset| offset.checked_add(accessor.byte_offset))
            .and_then(|offset| offset.checked_add(element_size));
        if last_end.is_none_or(|end| end > view_data.len()) {
            return Err(ParserError::FormatError {
                reason: "Accessor exceeds its buffer view",
            });
        }

        let mut out = Vec::with_capacity(values);
        for element in 0..accessor.count {
            let start = accessor.byte_offset + element * stride;
            for component in 0..components {
                let offset = start + component * component_size;
                out.push(decode(&view_data[offset..offset + component_size]));
            }
        }

        Ok(out)
    }
}

fn decode_float(raw: &[u8], component_type: ComponentType, normalized: bool) -> f32 {
    match (component_type, normalized) {
        (ComponentType::Float, _) => LittleEndian::read_f32(raw),
        (ComponentType::UnsignedByte, true) => raw[0] as f32 / 255.0,
        (ComponentType::UnsignedByte, false) => raw[0] as f32,
        (ComponentType::Byte, true) => (raw[0] as i8 as f32 / 127.0).max(-1.0),
        (ComponentType::Byte, false) => raw[0] as i8 as f32,
        (ComponentType::UnsignedShort, true) => LittleEndian::read_u16(raw) as f32 / 65535.0,
        (ComponentType::UnsignedShort, false) => LittleEndian::read_u16(raw) as f32,
        (ComponentType::Short, true) => (LittleEndian::read_i16(raw) as f32 / 32767.0).max(-1.0),
        (ComponentType::Short, false) => LittleEndian::read_i16(raw) as f32,
        (ComponentType::UnsignedInt, _) => LittleEndian::read_u32(raw) as f32,
    }
}
