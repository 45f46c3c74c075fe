use byteorder::{ByteOrder, LittleEndian};

use crate::ParserError;
use crate::common::writer::Emittable;
use crate::fbx::types::{ArrayEncoding, FBX_MAGIC, FBX_VERSION_WIDE_OFFSETS, FbxDocument, FbxNode, FbxProperty};

/// Writes binary FBX node trees. Arrays are stored uncompressed and the file footer is omitted,
/// which is enough for any reader that stops at the top-level null record.
pub struct FbxWriter {}

impl FbxWriter {
    pub fn to_vec(document: &FbxDocument) -> Result<Vec<u8>, ParserError> {
        let mut out = Vec::new();
        out.extend_from_slice(FBX_MAGIC);
        document.version.emit(&mut out)?;

        let wide = document.version >= FBX_VERSION_WIDE_OFFSETS;
        for node in &document.nodes {
            write_node(&mut out, node, wide)?;
        }
        write_null_record(&mut out, wide);

        Ok(out)
    }
}

fn offset_width(wide: bool) -> usize {
    if wide { 8 } else { 4 }
}

fn write_null_record(out: &mut Vec<u8>, wide: bool) {
    out.resize(out.len() + 3 * offset_width(wide) + 1, 0);
}

fn patch_offset(out: &mut [u8], at: usize, value: usize, wide: bool) -> Result<(), ParserError> {
    if wide {
        LittleEndian::write_u64(&mut out[at..at + 8], value as u64);
    } else {
        let value = u32::try_from(value).map_err(|_| ParserError::LengthOverflow {
            what: "FBX node record",
            size: value,
        })?;
        LittleEndian::write_u32(&mut out[at..at + 4], value);
    }
    Ok(())
}

fn write_node(out: &mut Vec<u8>, node: &FbxNode, wide: bool) -> Result<(), ParserError> {
    let width = offset_width(wide);
    let name_len = u8::try_from(node.name.len()).map_err(|_| ParserError::LengthOverflow {
        what: "FBX node name",
        size: node.name.len(),
    })?;

    let record_start = out.len();
    out.resize(record_start + 3 * width, 0);
    name_len.emit(out)?;
    out.extend_from_slice(node.name.as_bytes());

    let properties_start = out.len();
    for property in &node.properties {
        write_property(out, property)?;
    }
    let properties_len = out.len() - properties_start;

    if !node.children.is_empty() {
        for child in &node.children {
            write_node(out, child, wide)?;
        }
        write_null_record(out, wide);
    }

    let end_offset = out.len();
    patch_offset(out, record_start, end_offset, wide)?;
    patch_offset(out, record_start + width, node.properties.len(), wide)?;
    patch_offset(out, record_start + 2 * width, properties_len, wide)?;
    Ok(())
}

fn write_property(out: &mut Vec<u8>, property: &FbxProperty) -> Result<(), ParserError> {
    u8::from(property.property_type()).emit(out)?;
    match property {
        FbxProperty::I16(value) => value.emit(out),
        FbxProperty::Bool(value) => (*value as u8).emit(out),
        FbxProperty::I32(value) => value.emit(out),
        FbxProperty::F32(value) => value.emit(out),
        FbxProperty::F64(value) => value.emit(out),
        FbxProperty::I64(value) => value.emit(out),
        FbxProperty::String(value) => write_blob(out, value.as_bytes()),
        FbxProperty::Raw(value) => write_blob(out, value),
        FbxProperty::F32Array(values) => write_array(out, values, 4),
        FbxProperty::F64Array(values) => write_array(out, values, 8),
        FbxProperty::I64Array(values) => write_array(out, values, 8),
        FbxProperty::I32Array(values) => write_array(out, values, 4),
        FbxProperty::BoolArray(values) => {
            let raw: Vec<u8> = values.iter().map(|&value| value as u8).collect();
            write_array(out, &raw, 1)
        }
    }
}

fn to_u32(what: &'static str, size: usize) -> Result<u32, ParserError> {
    u32::try_from(size).map_err(|_| ParserError::LengthOverflow { what, size })
}

fn write_blob(out: &mut Vec<u8>, data: &[u8]) -> Result<(), ParserError> {
    to_u32("FBX property", data.len())?.emit(out)?;
    out.extend_from_slice(data);
    Ok(())
}

fn write_array<T: Emittable>(out: &mut Vec<u8>, values: &[T], element_size: usize) -> Result<(), ParserError> {
    to_u32("FBX array", values.len())?.emit(out)?;
    u32::from(ArrayEncoding::Raw).emit(out)?;
    to_u32("FBX array", values.len() * element_size)?.emit(out)?;
    for value in values {
        value.emit(out)?;
    }
    Ok(())
}
