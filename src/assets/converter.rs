use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use meshport_files::glb::reader::GlbReader;
use meshport_files::gltf::reader::GltfReader;

use crate::assets::codec::{DecodeSource, SceneDecoder, SceneEncoder};
use crate::assets::container::ContainerEncoder;
use crate::assets::error::IngestError;
use crate::assets::exporter::glb_exporter::GlbSceneEncoder;
use crate::assets::format::SourceFormat;
use crate::assets::loader::fbx_loader::FbxSceneDecoder;
use crate::assets::loader::gltf_loader::GltfSceneDecoder;
use crate::assets::loader::obj_loader::ObjSceneDecoder;
use crate::assets::resolver::{FileBag, PathIndex, ReferenceResolver};
use crate::io::common::loader::SourceFile;
use crate::settings::PipelineSettings;

/// One decoder per source format. GLB never needs one.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<SourceFormat, Arc<dyn SceneDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry, every conversion except GLB passthrough fails until decoders are added.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GltfSceneDecoder {}));
        registry.register(Arc::new(ObjSceneDecoder {}));
        registry.register(Arc::new(FbxSceneDecoder {}));
        registry
    }

    /// Registers `decoder` for the format it reports, returning the decoder it replaced.
    pub fn register(&mut self, decoder: Arc<dyn SceneDecoder>) -> Option<Arc<dyn SceneDecoder>> {
        self.decoders.insert(decoder.format(), decoder)
    }

    pub fn get(&self, format: SourceFormat) -> Result<&Arc<dyn SceneDecoder>, IngestError> {
        self.decoders
            .get(&format)
            .ok_or_else(|| IngestError::decode(format, "No decoder is registered for this format"))
    }
}

pub struct FormatConverter {
    registry: DecoderRegistry,
    encoder: Box<dyn SceneEncoder>,
    validate_passthrough: bool,
}

impl FormatConverter {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self::with_parts(
            DecoderRegistry::with_defaults(),
            Box::new(GlbSceneEncoder::new()),
            settings.validate_passthrough,
        )
    }

    pub fn with_parts(registry: DecoderRegistry, encoder: Box<dyn SceneEncoder>, validate_passthrough: bool) -> Self {
        Self {
            registry,
            encoder,
            validate_passthrough,
        }
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Produces the canonical container for `primary`. The format is picked by extension first and
    /// refined by content, companions are only consulted by text formats.
    pub fn convert(&self, primary: SourceFile, companions: Vec<SourceFile>) -> Result<Vec<u8>, IngestError> {
        let format = SourceFormat::from_file_name(&primary.name)?.sniff(&primary.bytes);
        debug!("Converting {} as {} with {} companions", primary.name, format, companions.len());

        if format == SourceFormat::Glb {
            if self.validate_passthrough {
                GlbReader::parse_slice(&primary.bytes).map_err(|err| IngestError::decode(SourceFormat::Glb, err))?;
            }
            return Ok(primary.bytes);
        }

        let decoder = self.registry.get(format)?;
        let bag = FileBag::from(companions);
        let index = PathIndex::build(&bag);

        let source = DecodeSource {
            file_name: &primary.name,
            bytes: &primary.bytes,
            document: None,
            materials: None,
            companions: &index,
        };

        let scene = match format {
            SourceFormat::Gltf => {
                let document =
                    GltfReader::parse_document(&primary.bytes).map_err(|err| IngestError::decode(SourceFormat::Gltf, err))?;
                let resolved = ReferenceResolver::resolve(document, &index);
                decoder.decode(&DecodeSource {
                    document: Some(&resolved),
                    ..source
                })?
            }
            SourceFormat::Obj => {
                let materials = bag.find_by_extension("mtl").map(|(name, entry)| {
                    trace!("Using {} as material library of {}", name, primary.name);
                    entry.bytes.as_slice()
                });
                decoder.decode(&DecodeSource { materials, ..source })?
            }
            SourceFormat::Fbx | SourceFormat::Glb => decoder.decode(&source)?,
        };

        trace!("{} decoded into {} nodes", primary.name, scene.nodes.len());
        ContainerEncoder::encode_scene(self.encoder.as_ref(), &scene)
    }
}
