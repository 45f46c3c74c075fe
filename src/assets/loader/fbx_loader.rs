use log::trace;
use meshport_files::fbx::reader::FbxReader;

use crate::assets::codec::{DecodeSource, SceneDecoder};
use crate::assets::common::types::Scene;
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::assets::importer::fbx_importer::FbxImporter;

/// Binary FBX 7.x only, ASCII files are rejected by the reader.
pub struct FbxSceneDecoder {}

impl SceneDecoder for FbxSceneDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Fbx
    }

    fn decode(&self, source: &DecodeSource<'_>) -> Result<Scene, IngestError> {
        let document = FbxReader::parse_slice(source.bytes).map_err(|err| IngestError::decode(SourceFormat::Fbx, err))?;
        trace!("{}: FBX {} with {} top level nodes", source.file_name, document.version, document.nodes.len());

        FbxImporter::import(&document)
    }
}
