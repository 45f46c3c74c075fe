use std::io::Cursor;

use log::trace;
use meshport_files::obj::reader::ObjReader;

use crate::assets::codec::{DecodeSource, SceneDecoder};
use crate::assets::common::types::Scene;
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::assets::importer::obj_importer::ObjImporter;

pub struct ObjSceneDecoder {}

impl SceneDecoder for ObjSceneDecoder {
    fn format(&self) -> SourceFormat {
        SourceFormat::Obj
    }

    fn decode(&self, source: &DecodeSource<'_>) -> Result<Scene, IngestError> {
        let library = match source.materials {
            Some(materials) => Some(
                ObjReader::parse_material_library(&mut Cursor::new(materials))
                    .map_err(|err| IngestError::decode(SourceFormat::Obj, err))?,
            ),
            None => None,
        };

        let asset = ObjReader::parse_asset(&mut Cursor::new(source.bytes))
            .map_err(|err| IngestError::decode(SourceFormat::Obj, err))?;
        trace!(
            "{}: {} positions, {} groups, mtllib {:?}",
            source.file_name,
            asset.positions.len(),
            asset.groups.len(),
            asset.material_libraries
        );

        Ok(ObjImporter::import(&asset, library.as_ref(), source.companions))
    }
}
