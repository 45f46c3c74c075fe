use meshport_files::gltf::types::GltfDocument;

use crate::assets::common::types::Scene;
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::assets::resolver::{PathIndex, ResolvedDocument};

/// Everything a decoder may need for one conversion. Which fields are set depends on the format.
pub struct DecodeSource<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
    /// glTF only: the parsed document with its references already resolved.
    pub document: Option<&'a ResolvedDocument>,
    /// OBJ only: the raw `.mtl` companion, if one was provided.
    pub materials: Option<&'a [u8]>,
    /// All companions, for formats that reference further files (textures named by an MTL).
    pub companions: &'a PathIndex,
}

/// Turns one source format into the scene IR. Implementations are registered per format in the
/// `DecoderRegistry` and can be swapped by the host.
pub trait SceneDecoder: Send + Sync {
    fn format(&self) -> SourceFormat;

    fn decode(&self, source: &DecodeSource<'_>) -> Result<Scene, IngestError>;
}

/// The output of a [`SceneEncoder`]: a document that refers to `binary` as its only buffer.
pub struct EncodedScene {
    pub document: GltfDocument,
    pub binary: Vec<u8>,
}

pub trait SceneEncoder: Send + Sync {
    fn encode(&self, scene: &Scene) -> Result<EncodedScene, IngestError>;
}
