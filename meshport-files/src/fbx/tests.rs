use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::ParserError;
use crate::fbx::reader::FbxReader;
use crate::fbx::types::{FBX_MAGIC, FbxDocument, FbxNode, FbxProperty, object_display_name};
use crate::fbx::writer::FbxWriter;

fn cube_like(version: u32) -> FbxDocument {
    let geometry = FbxNode::new(
        "Geometry",
        vec![
            FbxProperty::I64(1000),
            FbxProperty::String("Tri\x00\x01Geometry".to_string()),
            FbxProperty::String("Mesh".to_string()),
        ],
        vec![
            FbxNode::new(
                "Vertices",
                vec![FbxProperty::F64Array(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])],
                vec![],
            ),
            FbxNode::new("PolygonVertexIndex", vec![FbxProperty::I32Array(vec![0, 1, -3])], vec![]),
        ],
    );

    let model = FbxNode::new(
        "Model",
        vec![
            FbxProperty::I64(2000),
            FbxProperty::String("Tri\x00\x01Model".to_string()),
            FbxProperty::String("Mesh".to_string()),
        ],
        vec![],
    );

    FbxDocument {
        version,
        nodes: vec![
            FbxNode::new("FBXHeaderExtension", vec![], vec![FbxNode::new("FBXVersion", vec![FbxProperty::I32(version as i32)], vec![])]),
            FbxNode::new("Objects", vec![], vec![geometry, model]),
            FbxNode::new(
                "Connections",
                vec![],
                vec![FbxNode::new(
                    "C",
                    vec![FbxProperty::String("OO".to_string()), FbxProperty::I64(1000), FbxProperty::I64(2000)],
                    vec![],
                )],
            ),
        ],
    }
}

#[test]
fn reads_back_both_offset_widths() -> Result<(), anyhow::Error> {
    for version in [7400, 7500] {
        let document = cube_like(version);
        let bytes = FbxWriter::to_vec(&document)?;
        assert!(FbxReader::is_binary_fbx(&bytes));

        let parsed = FbxReader::parse_slice(&bytes)?;
        assert_eq!(parsed, document);
        assert_eq!(parsed.objects("Geometry").count(), 1);
        assert_eq!(parsed.objects("Model").count(), 1);
    }
    Ok(())
}

#[test]
fn decompresses_zlib_arrays() -> Result<(), anyhow::Error> {
    let values = [1.5f32, -2.0, 3.25];
    let mut raw = Vec::new();
    for value in values {
        raw.extend_from_slice(&value.to_le_bytes());
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    // property: 'f', count, encoding 1, compressed length, data
    let mut property = vec![b'f'];
    property.extend_from_slice(&3u32.to_le_bytes());
    property.extend_from_slice(&1u32.to_le_bytes());
    property.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    property.extend_from_slice(&compressed);

    let name = b"Values";
    let header_len = 13 + name.len();
    let end_offset = 27 + header_len + property.len();

    let mut bytes = FBX_MAGIC.to_vec();
    bytes.extend_from_slice(&7400u32.to_le_bytes());
    bytes.extend_from_slice(&(end_offset as u32).to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&(property.len() as u32).to_le_bytes());
    bytes.push(name.len() as u8);
    bytes.extend_from_slice(name);
    bytes.extend_from_slice(&property);
    bytes.extend_from_slice(&[0; 13]);

    let parsed = FbxReader::parse_slice(&bytes)?;
    assert_eq!(parsed.nodes[0].name, "Values");
    assert_eq!(parsed.nodes[0].properties[0], FbxProperty::F32Array(values.to_vec()));
    Ok(())
}

#[test]
fn rejects_ascii_and_foreign_files() {
    let ascii = b"; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n}";
    assert!(matches!(FbxReader::parse_slice(ascii), Err(ParserError::FormatError { .. })));

    assert!(matches!(FbxReader::parse_slice(&[0x67, 0x6C, 0x54, 0x46]), Err(ParserError::InvalidMagicValue { .. })));
    assert!(matches!(FbxReader::parse_slice(&[]), Err(ParserError::EmptySource)));
}

#[test]
fn rejects_unsupported_versions_and_truncation() -> Result<(), anyhow::Error> {
    let bytes = FbxWriter::to_vec(&cube_like(6100))?;
    assert!(matches!(FbxReader::parse_slice(&bytes), Err(ParserError::UnsupportedVersion { version: 6100 })));

    let bytes = FbxWriter::to_vec(&cube_like(7400))?;
    assert!(FbxReader::parse_slice(&bytes[..bytes.len() / 2]).is_err());
    Ok(())
}

#[test]
fn property_helpers() {
    assert_eq!(object_display_name("Tri\x00\x01Model"), "Tri");
    assert_eq!(object_display_name("Model::Tri"), "Tri");
    assert_eq!(object_display_name("Tri"), "Tri");

    assert_eq!(FbxProperty::I32(4).as_f64(), Some(4.0));
    assert_eq!(FbxProperty::F32Array(vec![0.5]).to_f64_vec(), Some(vec![0.5]));
    assert_eq!(FbxProperty::I64Array(vec![-3]).to_i32_vec(), Some(vec![-3]));
    assert_eq!(FbxProperty::String("x".into()).as_i64(), None);
}
