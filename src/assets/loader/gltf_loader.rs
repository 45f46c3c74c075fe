use crate::assets::codec::{DecodeSource, SceneDecoder};
use crate::assets::common::types::Scene;
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::assets::importer::gltf_importer::GltfImporter;

/// Expects the converter to have parsed and resolved the document already.
pub struct GltfSceneDecoder {}

impl SceneDecoder for GltfSceneDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Gltf
    }

    fn decode(&self, source: &DecodeSource<'_>) -> Result<Scene, IngestError> {
        let resolved = source
            .document
            .ok_or_else(|| IngestError::decode(SourceFormat::Gltf, "No resolved document was provided"))?;

        GltfImporter::import(resolved)
    }
}
