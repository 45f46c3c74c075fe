use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use meshport::assets::cache::{AssetCache, AssetHandle};
use meshport::assets::codec::{DecodeSource, SceneDecoder};
use meshport::assets::common::types::Scene;
use meshport::assets::container::ContainerEncoder;
use meshport::assets::converter::{DecoderRegistry, FormatConverter};
use meshport::assets::dispatcher::IngestionDispatcher;
use meshport::assets::error::IngestError;
use meshport::assets::exporter::glb_exporter::GlbSceneEncoder;
use meshport::assets::format::SourceFormat;
use meshport::assets::loader::obj_loader::ObjSceneDecoder;
use meshport::io::common::loader::{FileRef, SourceFile};
use meshport::io::fs::loader::FsContentReader;
use meshport::io::memory::loader::MemoryContentReader;
use meshport::settings::PipelineSettings;
use meshport_files::fbx::types::{FbxDocument, FbxNode, FbxProperty};
use meshport_files::fbx::writer::FbxWriter;
use meshport_files::glb::reader::GlbReader;
use meshport_files::glb::types::GLB_MAGIC;
use meshport_files::gltf::reader::GltfReader;

const OBJ: &[u8] = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

fn triangle_bin() -> Vec<u8> {
    let mut bin = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    bin
}

const GLTF: &[u8] = br#"{
  "asset": { "version": "2.0" },
  "nodes": [{ "mesh": 0 }],
  "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
  "materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
  "textures": [{ "source": 0 }],
  "images": [{ "uri": "textures/diffuse.png" }],
  "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" }],
  "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
  "buffers": [{ "uri": "scene%20data.bin", "byteLength": 36 }]
}"#;

fn fbx() -> Result<Vec<u8>, anyhow::Error> {
    let geometry = FbxNode::new(
        "Geometry",
        vec![
            FbxProperty::I64(1),
            FbxProperty::String("Tri\x00\x01Geometry".to_string()),
            FbxProperty::String("Mesh".to_string()),
        ],
        vec![
            FbxNode::new("Vertices", vec![FbxProperty::F64Array(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])], vec![]),
            FbxNode::new("PolygonVertexIndex", vec![FbxProperty::I32Array(vec![0, 1, -3])], vec![]),
        ],
    );
    let document = FbxDocument {
        version: 7500,
        nodes: vec![FbxNode::new("Objects", vec![], vec![geometry])],
    };
    Ok(FbxWriter::to_vec(&document)?)
}

fn assert_canonical(glb: &[u8]) {
    let word = |offset: usize| u32::from_le_bytes([glb[offset], glb[offset + 1], glb[offset + 2], glb[offset + 3]]);
    assert_eq!(word(0), GLB_MAGIC);
    assert_eq!(word(8) as usize, glb.len());
}

fn dispatcher(reader: Arc<MemoryContentReader>) -> IngestionDispatcher {
    IngestionDispatcher::new(reader, &PipelineSettings::default())
}

#[test_log::test]
fn every_format_becomes_a_canonical_container() -> Result<(), anyhow::Error> {
    let reader = Arc::new(MemoryContentReader::new());
    let glb = ContainerEncoder::frame(br#"{"asset":{"version":"2.0"}}"#, None)?;

    let primaries = [
        reader.insert("model.glb", glb.clone()),
        reader.insert("model.gltf", GLTF.to_vec()),
        reader.insert("model.obj", OBJ.to_vec()),
        reader.insert("model.fbx", fbx()?),
    ];
    let companions = [
        reader.insert("scene data.bin", triangle_bin()),
        reader.insert("diffuse.png", vec![0x89, b'P', b'N', b'G']),
    ];

    let dispatcher = dispatcher(reader);
    for primary in &primaries {
        let handle = dispatcher.ingest(primary, &companions)?;
        assert_canonical(&handle);
    }

    assert_eq!(dispatcher.ingest(&primaries[0], &[])?.as_bytes(), glb.as_slice());
    assert_eq!(dispatcher.cache().stats().entries, 4);
    Ok(())
}

#[test_log::test]
fn gltf_references_are_embedded() -> Result<(), anyhow::Error> {
    let reader = Arc::new(MemoryContentReader::new());
    let primary = reader.insert("model.gltf", GLTF.to_vec());
    // only registered by their bare names
    let companions = [
        reader.insert("diffuse.png", vec![0x89, b'P', b'N', b'G']),
        reader.insert("scene data.bin", triangle_bin()),
    ];

    let handle = dispatcher(reader).ingest(&primary, &companions)?;
    let asset = GlbReader::parse_slice(&handle)?;
    let document = GltfReader::parse_document(asset.json_payload())?;

    assert_eq!(asset.json.len() % 4, 0);
    assert!(document.buffers.iter().all(|buffer| buffer.uri.is_none()));
    assert!(document.images.iter().all(|image| image.uri.is_none() && image.buffer_view.is_some()));
    assert_eq!(document.images[0].mime_type.as_deref(), Some("image/png"));
    assert_eq!(asset.bin.map(|bin| bin.len()), Some(document.buffers[0].byte_length));
    Ok(())
}

#[test_log::test]
fn missing_companion_is_named_and_nothing_is_cached() {
    let reader = Arc::new(MemoryContentReader::new());
    let primary = reader.insert("model.gltf", GLTF.to_vec());
    let companions = [reader.insert("scene data.bin", triangle_bin())];

    let dispatcher = dispatcher(reader);
    match dispatcher.ingest(&primary, &companions) {
        Err(IngestError::MissingReference { uri }) => assert_eq!(uri, "textures/diffuse.png"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(dispatcher.cache().stats().entries, 0);
    assert_eq!(dispatcher.stats().failures, 1);
}

struct CountingDecoder {
    inner: ObjSceneDecoder,
    calls: Arc<AtomicUsize>,
}

impl SceneDecoder for CountingDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Obj
    }

    fn decode(&self, source: &DecodeSource<'_>) -> Result<Scene, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(source)
    }
}

#[test_log::test]
fn cached_results_skip_the_converter() -> Result<(), anyhow::Error> {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = DecoderRegistry::with_defaults();
    registry.register(Arc::new(CountingDecoder {
        inner: ObjSceneDecoder {},
        calls: calls.clone(),
    }));

    let settings = PipelineSettings::default();
    let reader = Arc::new(MemoryContentReader::new());
    let primary = reader.insert("tri.obj", OBJ.to_vec());
    let dispatcher = IngestionDispatcher::with_parts(
        reader.clone(),
        FormatConverter::with_parts(registry, Box::new(GlbSceneEncoder::new()), true),
        Arc::new(AssetCache::new(settings.cache_budget_bytes)),
        &settings,
    );

    let first = dispatcher.ingest(&primary, &[])?;
    let second = dispatcher.ingest(&primary, &[])?;

    assert!(AssetHandle::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reader.reads(), 1);
    Ok(())
}

#[test_log::test]
fn unknown_extension_is_rejected_without_reading() {
    let reader = Arc::new(MemoryContentReader::new());
    let primary = FileRef::new("model.xyz", None, "does/not/exist.xyz");

    let result = dispatcher(reader.clone()).ingest(&primary, &[]);
    assert!(matches!(result, Err(IngestError::UnsupportedFormat { extension }) if extension == "xyz"));
    assert_eq!(reader.reads(), 0);
}

#[test_log::test]
fn ascii_fbx_is_a_decode_error() {
    let reader = Arc::new(MemoryContentReader::new());
    let result = dispatcher(reader).ingest_source(
        SourceFile::new("model.fbx", b"; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n}\n".to_vec()),
        vec![],
    );
    assert!(matches!(result, Err(IngestError::Decode { format: SourceFormat::Fbx, .. })));
}

#[test_log::test]
fn converts_files_from_disk() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("textures"))?;
    fs::write(dir.path().join("model.gltf"), GLTF)?;
    fs::write(dir.path().join("scene data.bin"), triangle_bin())?;
    fs::write(dir.path().join("textures").join("diffuse.png"), [0x89, b'P', b'N', b'G'])?;

    let primary_path = dir.path().join("model.gltf");
    let companions = FsContentReader::discover_companions(&primary_path)?;
    assert_eq!(companions.len(), 2);

    let dispatcher = IngestionDispatcher::new(Arc::new(FsContentReader::new()), &PipelineSettings::default());
    let handle = dispatcher.ingest(&FsContentReader::file_ref(&primary_path), &companions)?;
    assert_canonical(&handle);

    // a vanished companion is a read error
    fs::remove_file(dir.path().join("scene data.bin"))?;
    dispatcher.cache().clear();
    let result = dispatcher.ingest(&FsContentReader::file_ref(&primary_path), &companions);
    assert!(matches!(result, Err(IngestError::Read { .. })));
    Ok(())
}

#[test_log::test]
fn absurd_accessor_count_is_a_decode_error() {
    let gltf = br#"{
      "asset": { "version": "2.0" },
      "nodes": [{ "mesh": 0 }],
      "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
      "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 1000000000000000000, "type": "VEC3" }],
      "bufferViews": [{ "buffer": 0, "byteLength": 4 }],
      "buffers": [{ "uri": "data:application/octet-stream;base64,AAAAAA==", "byteLength": 4 }]
    }"#;

    let dispatcher = dispatcher(Arc::new(MemoryContentReader::new()));
    let result = dispatcher.ingest_source(SourceFile::new("huge.gltf", gltf.to_vec()), vec![]);

    assert!(matches!(result, Err(IngestError::Decode { format: SourceFormat::Gltf, .. })));
    assert_eq!(dispatcher.cache().stats().entries, 0);
}
