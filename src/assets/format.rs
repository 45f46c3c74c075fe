use std::fmt::{Display, Formatter};

use meshport_files::glb::reader::GlbReader;

use crate::assets::error::IngestError;
use crate::io::common::loader::extension_of;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Already canonical, passed through.
    Glb,
    /// JSON scene description with external buffers and images.
    Gltf,
    Fbx,
    /// Geometry only, materials in an optional sibling .mtl
    Obj,
}

impl SourceFormat {
    /// Detection is by extension only, unknown extensions are rejected before any byte is read.
    pub fn from_file_name(file_name: &str) -> Result<SourceFormat, IngestError> {
        let extension = extension_of(file_name).unwrap_or_default();
        match extension.as_str() {
            "glb" => Ok(SourceFormat::Glb),
            "gltf" => Ok(SourceFormat::Gltf),
            "fbx" => Ok(SourceFormat::Fbx),
            "obj" => Ok(SourceFormat::Obj),
            _ => Err(IngestError::UnsupportedFormat { extension }),
        }
    }

    /// Refines the extension based guess with the content: `.gltf` files holding GLB bytes are GLB.
    pub fn sniff(self, bytes: &[u8]) -> SourceFormat {
        match self {
            SourceFormat::Gltf if GlbReader::is_glb(bytes) => SourceFormat::Glb,
            format => format,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Glb => "glb",
            SourceFormat::Gltf => "gltf",
            SourceFormat::Fbx => "fbx",
            SourceFormat::Obj => "obj",
        }
    }
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Glb => write!(f, "GLB"),
            SourceFormat::Gltf => write!(f, "glTF"),
            SourceFormat::Fbx => write!(f, "FBX"),
            SourceFormat::Obj => write!(f, "OBJ"),
        }
    }
}
