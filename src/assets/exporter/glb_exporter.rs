use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use itertools::Itertools;
use log::trace;
use meshport_files::gltf::types::{
    Accessor, AccessorType, Buffer, BufferView, ComponentType, GltfDocument, Image, Material as GltfMaterial, Mesh as GltfMesh,
    Node, PbrMetallicRoughness, Primitive as GltfPrimitive, Scene as GltfScene, TARGET_ARRAY_BUFFER,
    TARGET_ELEMENT_ARRAY_BUFFER, Texture as GltfTexture, TextureInfo,
};

use crate::assets::codec::{EncodedScene, SceneEncoder};
use crate::assets::common::types::{Material, Primitive, Scene, SceneNode};
use crate::assets::error::IngestError;

/// Writes the scene IR as a glTF document with one binary buffer. Every buffer view starts on a
/// 4 byte boundary, vertex attributes are `FLOAT`, indices `UNSIGNED_INT`.
pub struct GlbSceneEncoder {
    generator: String,
}

impl GlbSceneEncoder {
    pub fn new() -> Self {
        Self {
            generator: format!("meshport {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for GlbSceneEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneEncoder for GlbSceneEncoder {
    fn encode(&self, scene: &Scene) -> Result<EncodedScene, IngestError> {
        let mut builder = DocumentBuilder::default();
        builder.document.asset.generator = Some(self.generator.clone());

        for (index, texture) in scene.textures.iter().enumerate() {
            let view = builder.push_view(&texture.data, None);
            builder.document.images.push(Image {
                name: texture.name.clone(),
                mime_type: Some(texture.mime_type.clone()),
                buffer_view: Some(view),
                ..Default::default()
            });
            builder.document.textures.push(GltfTexture {
                source: Some(index),
                ..Default::default()
            });
        }

        for material in &scene.materials {
            let material = convert_material(material, scene.textures.len())?;
            builder.document.materials.push(material);
        }

        // Meshes without a single drawable primitive can't be expressed in glTF, nodes drop them.
        let mut mesh_mapping = BTreeMap::new();
        for (index, mesh) in scene.meshes.iter().enumerate() {
            let mut primitives = Vec::with_capacity(mesh.primitives.len());
            for primitive in &mesh.primitives {
                if primitive.vertex_buffers.vertex_count() == 0 || primitive.index_buffer.is_empty() {
                    trace!("Skipping empty primitive of mesh {:?}", mesh.name);
                    continue;
                }

                primitives.push(builder.push_primitive(primitive, scene.materials.len())?);
            }

            if primitives.is_empty() {
                continue;
            }

            mesh_mapping.insert(index, builder.document.meshes.len());
            builder.document.meshes.push(GltfMesh {
                name: mesh.name.clone(),
                primitives,
                ..Default::default()
            });
        }

        for node in &scene.nodes {
            let node = convert_node(node, &mesh_mapping, scene)?;
            builder.document.nodes.push(node);
        }

        if let Some(&root) = scene.roots.iter().find(|&&root| root >= scene.nodes.len()) {
            return Err(IngestError::encode(format!("Root node {} does not exist", root)));
        }

        if !scene.nodes.is_empty() {
            builder.document.scenes.push(GltfScene {
                nodes: scene.roots.clone(),
                ..Default::default()
            });
            builder.document.scene = Some(0);
        }

        Ok(builder.finish())
    }
}

#[derive(Default)]
struct DocumentBuilder {
    document: GltfDocument,
    binary: Vec<u8>,
}

impl DocumentBuilder {
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        self.binary.resize(self.binary.len().next_multiple_of(4), 0);

        self.document.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: self.binary.len(),
            byte_length: bytes.len(),
            target,
            ..Default::default()
        });
        self.binary.extend_from_slice(bytes);
        self.document.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, bytes: &[u8], target: u32, component_type: ComponentType, accessor_type: AccessorType, count: usize) -> usize {
        let view = self.push_view(bytes, Some(target));
        self.document.accessors.push(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: component_type.into(),
            normalized: false,
            count,
            accessor_type,
            min: None,
            max: None,
            other: Default::default(),
        });
        self.document.accessors.len() - 1
    }

    fn push_floats(&mut self, values: impl Iterator<Item = f32>, accessor_type: AccessorType, count: usize) -> usize {
        let bytes = values.flat_map(f32::to_le_bytes).collect_vec();
        self.push_accessor(&bytes, TARGET_ARRAY_BUFFER, ComponentType::Float, accessor_type, count)
    }

    fn push_primitive(&mut self, primitive: &Primitive, material_count: usize) -> Result<GltfPrimitive, IngestError> {
        let buffers = &primitive.vertex_buffers;
        let count = buffers.vertex_count();

        for (semantic, len) in [
            ("NORMAL", buffers.normals_buffer.len()),
            ("TEXCOORD_0", buffers.texcoord_buffer_0.len()),
            ("COLOR_0", buffers.vertex_color_0.len()),
        ] {
            if len != 0 && len != count {
                return Err(IngestError::encode(format!(
                    "{} has {} elements, but there are {} positions",
                    semantic, len, count
                )));
            }
        }

        if primitive.index_buffer.len() % 3 != 0 {
            return Err(IngestError::encode("Index buffer is not a triangle list"));
        }

        if let Some(&index) = primitive.index_buffer.iter().find(|&&index| index as usize >= count) {
            return Err(IngestError::encode(format!(
                "Index {} is out of range for {} vertices",
                index, count
            )));
        }

        if let Some(material) = primitive.material.filter(|&material| material >= material_count) {
            return Err(IngestError::encode(format!("Material {} does not exist", material)));
        }

        let mut attributes = BTreeMap::new();

        let position = self.push_floats(
            buffers.position_buffer.iter().flat_map(|p| p.to_array()),
            AccessorType::Vec3,
            count,
        );
        // POSITION requires bounds
        let (min, max) = buffers
            .position_buffer
            .iter()
            .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(min, max), p| (min.min(*p), max.max(*p)));
        self.document.accessors[position].min = Some(min.to_array().to_vec());
        self.document.accessors[position].max = Some(max.to_array().to_vec());
        attributes.insert("POSITION".to_string(), position);

        if !buffers.normals_buffer.is_empty() {
            let normal = self.push_floats(buffers.normals_buffer.iter().flat_map(|n| n.to_array()), AccessorType::Vec3, count);
            attributes.insert("NORMAL".to_string(), normal);
        }

        if !buffers.texcoord_buffer_0.is_empty() {
            let uv = self.push_floats(buffers.texcoord_buffer_0.iter().flat_map(|uv| uv.to_array()), AccessorType::Vec2, count);
            attributes.insert("TEXCOORD_0".to_string(), uv);
        }

        if !buffers.vertex_color_0.is_empty() {
            let color = self.push_floats(buffers.vertex_color_0.iter().flat_map(|c| c.to_array()), AccessorType::Vec4, count);
            attributes.insert("COLOR_0".to_string(), color);
        }

        let index_bytes = primitive.index_buffer.iter().flat_map(|i| i.to_le_bytes()).collect_vec();
        let indices = self.push_accessor(
            &index_bytes,
            TARGET_ELEMENT_ARRAY_BUFFER,
            ComponentType::UnsignedInt,
            AccessorType::Scalar,
            primitive.index_buffer.len(),
        );

        Ok(GltfPrimitive {
            attributes,
            indices: Some(indices),
            material: primitive.material,
            ..Default::default()
        })
    }

    fn finish(mut self) -> EncodedScene {
        // The BIN chunk gets zero padded anyway, declaring the padded length keeps validators quiet.
        self.binary.resize(self.binary.len().next_multiple_of(4), 0);
        if !self.binary.is_empty() {
            self.document.buffers.push(Buffer {
                uri: None,
                byte_length: self.binary.len(),
                ..Default::default()
            });
        }

        EncodedScene {
            document: self.document,
            binary: self.binary,
        }
    }
}

fn convert_material(material: &Material, texture_count: usize) -> Result<GltfMaterial, IngestError> {
    if let Some(texture) = material.base_color_texture.filter(|&texture| texture >= texture_count) {
        return Err(IngestError::encode(format!("Texture {} does not exist", texture)));
    }

    Ok(GltfMaterial {
        name: material.name.clone(),
        pbr_metallic_roughness: Some(PbrMetallicRoughness {
            base_color_factor: Some(material.base_color_factor.to_array()),
            base_color_texture: material.base_color_texture.map(|index| TextureInfo {
                index,
                ..Default::default()
            }),
            metallic_factor: Some(material.metallic_factor),
            roughness_factor: Some(material.roughness_factor),
            ..Default::default()
        }),
        double_sided: material.double_sided,
        ..Default::default()
    })
}

fn convert_node(node: &SceneNode, mesh_mapping: &BTreeMap<usize, usize>, scene: &Scene) -> Result<Node, IngestError> {
    if let Some(&child) = node.children.iter().find(|&&child| child >= scene.nodes.len()) {
        return Err(IngestError::encode(format!("Child node {} does not exist", child)));
    }

    if let Some(mesh) = node.mesh.filter(|&mesh| mesh >= scene.meshes.len()) {
        return Err(IngestError::encode(format!("Mesh {} does not exist", mesh)));
    }

    Ok(Node {
        name: node.name.clone(),
        mesh: node.mesh.and_then(|mesh| mesh_mapping.get(&mesh).copied()),
        children: node.children.clone(),
        matrix: (node.transform != Mat4::IDENTITY).then(|| node.transform.to_cols_array()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec4};

    use super::*;
    use crate::assets::common::types::{Mesh, Texture, VertexBuffers};

    fn triangle(material: Option<usize>) -> Primitive {
        Primitive {
            vertex_buffers: VertexBuffers {
                position_buffer: vec![Vec3::ZERO, Vec3::X, Vec3::new(0.0, 2.0, -1.0)],
                normals_buffer: vec![Vec3::Z; 3],
                texcoord_buffer_0: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                vertex_color_0: vec![],
            },
            index_buffer: vec![0, 1, 2],
            material,
        }
    }

    fn scene() -> Scene {
        let mut scene = Scene::default();
        let texture = scene.add_texture(Texture {
            name: Some("wood.png".to_string()),
            mime_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G', 1],
        });
        let material = scene.add_material(Material {
            name: Some("Wood".to_string()),
            base_color_factor: Vec4::new(1.0, 0.5, 0.25, 1.0),
            base_color_texture: Some(texture),
            ..Default::default()
        });
        let mesh = scene.add_mesh(Mesh {
            name: Some("Tri".to_string()),
            primitives: vec![triangle(Some(material))],
        });
        let root = scene.add_root(SceneNode::new(Some("Root".to_string()), None));
        let child = scene.nodes.len();
        let mut node = SceneNode::new(Some("Tri".to_string()), Some(mesh));
        node.transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        scene.nodes.push(node);
        scene.nodes[root].children.push(child);
        scene
    }

    #[test]
    fn encodes_aligned_views_and_bounds() -> Result<(), anyhow::Error> {
        let encoded = GlbSceneEncoder::new().encode(&scene())?;
        let document = &encoded.document;

        assert_eq!(encoded.binary.len() % 4, 0);
        assert_eq!(document.buffers.len(), 1);
        assert_eq!(document.buffers[0].byte_length, encoded.binary.len());
        assert!(document.buffers[0].uri.is_none());
        assert!(document.buffer_views.iter().all(|view| view.byte_offset % 4 == 0));

        let primitive = &document.meshes[0].primitives[0];
        let position = &document.accessors[primitive.attributes["POSITION"]];
        assert_eq!(position.min, Some(vec![0.0, 0.0, -1.0]));
        assert_eq!(position.max, Some(vec![1.0, 2.0, 0.0]));
        assert!(primitive.attributes.contains_key("NORMAL"));
        assert!(primitive.attributes.contains_key("TEXCOORD_0"));
        assert!(!primitive.attributes.contains_key("COLOR_0"));

        assert_eq!(document.images[0].mime_type.as_deref(), Some("image/png"));
        assert_eq!(document.textures[0].source, Some(0));
        let pbr = document.materials[0].pbr_metallic_roughness.clone().unwrap_or_default();
        assert_eq!(pbr.base_color_texture.map(|info| info.index), Some(0));

        assert_eq!(document.scenes[0].nodes, vec![0]);
        assert_eq!(document.nodes[0].children, vec![1]);
        assert!(document.nodes[0].matrix.is_none());
        assert_eq!(document.nodes[1].matrix.map(|m| m[12..15].to_vec()), Some(vec![1.0, 2.0, 3.0]));
        Ok(())
    }

    #[test]
    fn rejects_inconsistent_scenes() {
        let mut bad_normals = scene();
        bad_normals.meshes[0].primitives[0].vertex_buffers.normals_buffer.pop();
        assert!(matches!(GlbSceneEncoder::new().encode(&bad_normals), Err(IngestError::Encode { .. })));

        let mut bad_index = scene();
        bad_index.meshes[0].primitives[0].index_buffer[2] = 3;
        assert!(matches!(GlbSceneEncoder::new().encode(&bad_index), Err(IngestError::Encode { .. })));

        let mut bad_material = scene();
        bad_material.meshes[0].primitives[0].material = Some(4);
        assert!(matches!(GlbSceneEncoder::new().encode(&bad_material), Err(IngestError::Encode { .. })));
    }

    #[test]
    fn empty_meshes_are_dropped() -> Result<(), anyhow::Error> {
        let mut scene = scene();
        scene.meshes[0].primitives[0].index_buffer.clear();
        let encoded = GlbSceneEncoder::new().encode(&scene)?;
        assert!(encoded.document.meshes.is_empty());
        assert!(encoded.document.nodes[1].mesh.is_none());
        Ok(())
    }
}
