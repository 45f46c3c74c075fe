use log::trace;
use meshport_files::glb::writer::GlbWriter;
use meshport_files::gltf::reader::GltfReader;
use meshport_files::gltf::types::GltfDocument;

use crate::assets::codec::{EncodedScene, SceneEncoder};
use crate::assets::common::types::Scene;
use crate::assets::error::IngestError;

/// Owns the GLB framing: header, JSON chunk and the optional BIN chunk.
pub struct ContainerEncoder {}

impl ContainerEncoder {
    pub fn encode_scene(encoder: &dyn SceneEncoder, scene: &Scene) -> Result<Vec<u8>, IngestError> {
        let EncodedScene { document, binary } = encoder.encode(scene)?;
        Self::encode_document(&document, &binary)
    }

    pub fn encode_document(document: &GltfDocument, binary: &[u8]) -> Result<Vec<u8>, IngestError> {
        let json = GltfReader::write_document(document).map_err(IngestError::encode)?;
        Self::frame(&json, Some(binary))
    }

    /// `json` is padded with spaces, `binary` with zeros. An empty `binary` is left out.
    pub fn frame(json: &[u8], binary: Option<&[u8]>) -> Result<Vec<u8>, IngestError> {
        let glb = GlbWriter::to_vec(json, binary).map_err(IngestError::encode)?;
        trace!(
            "Framed {} bytes of JSON and {} bytes of binary into {} bytes",
            json.len(),
            binary.map_or(0, <[u8]>::len),
            glb.len()
        );
        Ok(glb)
    }
}

#[cfg(test)]
mod tests {
    use meshport_files::glb::reader::GlbReader;
    use meshport_files::gltf::types::Buffer;

    use super::*;

    struct FailingEncoder {}

    impl SceneEncoder for FailingEncoder {
        fn encode(&self, _scene: &Scene) -> Result<EncodedScene, IngestError> {
            Err(IngestError::encode("no scenes today"))
        }
    }

    #[test]
    fn frames_document_and_binary() -> Result<(), anyhow::Error> {
        let mut document = GltfDocument::default();
        document.buffers.push(Buffer {
            byte_length: 6,
            ..Default::default()
        });

        let glb = ContainerEncoder::encode_document(&document, &[1, 2, 3, 4, 5, 6])?;
        let asset = GlbReader::parse_slice(&glb)?;
        assert_eq!(asset.header.length as usize, glb.len());
        assert_eq!(asset.json.len() % 4, 0);
        assert_eq!(asset.json_payload(), GltfReader::write_document(&document)?.as_slice());
        assert_eq!(asset.bin.map(|bin| bin.len()), Some(8));
        Ok(())
    }

    #[test]
    fn encoder_errors_keep_their_message() {
        match ContainerEncoder::encode_scene(&FailingEncoder {}, &Scene::default()) {
            Err(IngestError::Encode { message }) => assert_eq!(message, "no scenes today"),
            other => panic!("unexpected {:?}", other.map(|glb| glb.len())),
        }
    }
}
