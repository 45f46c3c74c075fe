use std::collections::HashSet;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use itertools::Itertools;
use log::{trace, warn};
use meshport_files::gltf::reader::GltfReader;
use meshport_files::gltf::types::{AccessorType, GltfDocument, MODE_TRIANGLES, Material as GltfMaterial};

use crate::assets::common::types::{Material, Mesh, Primitive, Scene, SceneNode, Texture, VertexBuffers};
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::assets::resolver::{BLOB_URI_PREFIX, ResolvedDocument};
use crate::io::common::loader::mime_type_for;

fn decode_error(err: impl std::fmt::Display) -> IngestError {
    IngestError::decode(SourceFormat::Gltf, err)
}

pub struct GltfImporter {}

impl GltfImporter {
    pub fn import(resolved: &ResolvedDocument) -> Result<Scene, IngestError> {
        let document = &resolved.document;
        let buffers = Self::load_buffers(resolved)?;

        let textures = Self::create_textures(resolved, &buffers)?;
        let materials = document
            .materials
            .iter()
            .map(|material| Self::create_material(document, material))
            .collect::<Result<Vec<_>, _>>()?;
        let meshes = Self::create_meshes(document, &buffers)?;
        let (nodes, roots) = Self::create_nodes(document)?;

        trace!(
            "Imported {} nodes, {} meshes, {} materials and {} textures",
            nodes.len(),
            meshes.len(),
            materials.len(),
            textures.len()
        );

        Ok(Scene {
            nodes,
            roots,
            meshes,
            materials,
            textures,
        })
    }

    /// The bytes of every `buffers[]` entry, in document order.
    pub fn load_buffers(resolved: &ResolvedDocument) -> Result<Vec<Vec<u8>>, IngestError> {
        resolved
            .document
            .buffers
            .iter()
            .enumerate()
            .map(|(index, buffer)| {
                let uri = buffer
                    .uri
                    .as_deref()
                    .ok_or_else(|| decode_error(format!("Buffer {} has no uri", index)))?;
                let (bytes, _) = Self::fetch(resolved, uri)?;

                if bytes.len() < buffer.byte_length {
                    return Err(decode_error(format!(
                        "Buffer {} declares {} bytes, but only {} are present",
                        index,
                        buffer.byte_length,
                        bytes.len()
                    )));
                }
                Ok(bytes)
            })
            .collect()
    }

    /// Bytes behind a `data:` or resolver issued `blob:` URI, plus the MIME type it implies.
    fn fetch(resolved: &ResolvedDocument, uri: &str) -> Result<(Vec<u8>, Option<String>), IngestError> {
        if let Some(decoded) = GltfReader::decode_data_uri(uri) {
            let mime_type = uri
                .strip_prefix("data:")
                .and_then(|rest| rest.split([';', ',']).next())
                .filter(|media| !media.is_empty())
                .map(str::to_string);
            return Ok((decoded.map_err(decode_error)?, mime_type));
        }

        match resolved.blob(uri) {
            Some(handle) if uri.starts_with(BLOB_URI_PREFIX) => {
                Ok((handle.bytes().to_vec(), Some(mime_type_for(handle.name()).to_string())))
            }
            _ => Err(IngestError::MissingReference { uri: uri.to_string() }),
        }
    }

    pub fn create_textures(resolved: &ResolvedDocument, buffers: &[Vec<u8>]) -> Result<Vec<Texture>, IngestError> {
        let document = &resolved.document;
        let mut textures = Vec::with_capacity(document.images.len());

        for (index, image) in document.images.iter().enumerate() {
            let (data, implied_mime) = match (&image.uri, image.buffer_view) {
                (Some(uri), _) => Self::fetch(resolved, uri)?,
                (None, Some(view_index)) => {
                    let view = document
                        .buffer_views
                        .get(view_index)
                        .ok_or_else(|| decode_error(format!("Image {} refers to a missing buffer view", index)))?;
                    let data = buffers
                        .get(view.buffer)
                        .and_then(|buffer| buffer.get(view.byte_offset..view.byte_offset.checked_add(view.byte_length)?))
                        .ok_or_else(|| decode_error(format!("Image {} exceeds its buffer", index)))?;
                    (data.to_vec(), None)
                }
                (None, None) => return Err(decode_error(format!("Image {} has neither uri nor bufferView", index))),
            };

            let mime_type = image
                .mime_type
                .clone()
                .or(implied_mime)
                .unwrap_or_else(|| mime_type_for(image.name.as_deref().unwrap_or_default()).to_string());

            textures.push(Texture {
                name: image.name.clone(),
                mime_type,
                data,
            });
        }

        Ok(textures)
    }

    /// Textures in the IR are images, the glTF texture indirection is resolved here.
    pub fn create_material(document: &GltfDocument, material: &GltfMaterial) -> Result<Material, IngestError> {
        let mut result = Material {
            name: material.name.clone(),
            double_sided: material.double_sided,
            ..Default::default()
        };

        let Some(pbr) = &material.pbr_metallic_roughness else {
            return Ok(result);
        };

        if let Some(factor) = pbr.base_color_factor {
            result.base_color_factor = Vec4::from_array(factor);
        }
        result.metallic_factor = pbr.metallic_factor.unwrap_or(1.0);
        result.roughness_factor = pbr.roughness_factor.unwrap_or(1.0);

        if let Some(info) = &pbr.base_color_texture {
            let texture = document
                .textures
                .get(info.index)
                .ok_or_else(|| decode_error(format!("Texture {} does not exist", info.index)))?;

            match texture.source {
                Some(source) if source < document.images.len() => result.base_color_texture = Some(source),
                Some(source) => return Err(decode_error(format!("Image {} does not exist", source))),
                // Only extensions provide the image then
                None => warn!("Texture {} has no source, dropping it from {:?}", info.index, material.name),
            }
        }

        Ok(result)
    }

    pub fn create_meshes(document: &GltfDocument, buffers: &[Vec<u8>]) -> Result<Vec<Mesh>, IngestError> {
        let mut meshes = Vec::with_capacity(document.meshes.len());

        for mesh in &document.meshes {
            let mut primitives = Vec::with_capacity(mesh.primitives.len());

            for primitive in &mesh.primitives {
                if let Some(mode) = primitive.mode.filter(|&mode| mode != MODE_TRIANGLES) {
                    warn!("Skipping primitive of {:?} with unsupported mode {}", mesh.name, mode);
                    continue;
                }

                let position = *primitive
                    .attributes
                    .get("POSITION")
                    .ok_or_else(|| decode_error("Primitive without POSITION"))?;
                let position_buffer = read_attribute(document, buffers, position, &[AccessorType::Vec3])?
                    .chunks_exact(3)
                    .map(Vec3::from_slice)
                    .collect_vec();
                let count = position_buffer.len();

                let normals_buffer = match primitive.attributes.get("NORMAL") {
                    Some(&normal) => read_attribute(document, buffers, normal, &[AccessorType::Vec3])?
                        .chunks_exact(3)
                        .map(Vec3::from_slice)
                        .collect_vec(),
                    None => vec![],
                };

                let texcoord_buffer_0 = match primitive.attributes.get("TEXCOORD_0") {
                    Some(&uv) => read_attribute(document, buffers, uv, &[AccessorType::Vec2])?
                        .chunks_exact(2)
                        .map(Vec2::from_slice)
                        .collect_vec(),
                    None => vec![],
                };

                let vertex_color_0 = match primitive.attributes.get("COLOR_0") {
                    Some(&color) => {
                        let values = read_attribute(document, buffers, color, &[AccessorType::Vec3, AccessorType::Vec4])?;
                        if document.accessors[color].accessor_type == AccessorType::Vec4 {
                            values.chunks_exact(4).map(Vec4::from_slice).collect_vec()
                        } else {
                            values.chunks_exact(3).map(|rgb| Vec3::from_slice(rgb).extend(1.0)).collect_vec()
                        }
                    }
                    None => vec![],
                };

                for (semantic, len) in [
                    ("NORMAL", normals_buffer.len()),
                    ("TEXCOORD_0", texcoord_buffer_0.len()),
                    ("COLOR_0", vertex_color_0.len()),
                ] {
                    if len != 0 && len != count {
                        return Err(decode_error(format!("{} has {} elements for {} positions", semantic, len, count)));
                    }
                }

                let index_buffer = match primitive.indices {
                    Some(indices) => GltfReader::read_indices(document, buffers, indices).map_err(decode_error)?,
                    None => (0..count as u32).collect_vec(),
                };

                if index_buffer.len() % 3 != 0 {
                    return Err(decode_error("Triangle list length is not a multiple of 3"));
                }

                if let Some(&index) = index_buffer.iter().find(|&&index| index as usize >= count) {
                    return Err(decode_error(format!("Index {} exceeds {} vertices", index, count)));
                }

                if let Some(material) = primitive.material.filter(|&material| material >= document.materials.len()) {
                    return Err(decode_error(format!("Material {} does not exist", material)));
                }

                primitives.push(Primitive {
                    vertex_buffers: VertexBuffers {
                        position_buffer,
                        normals_buffer,
                        texcoord_buffer_0,
                        vertex_color_0,
                    },
                    index_buffer,
                    material: primitive.material,
                });
            }

            meshes.push(Mesh {
                name: mesh.name.clone(),
                primitives,
            });
        }

        Ok(meshes)
    }

    /// Returns the nodes and the roots of the default scene. Documents without scenes get every
    /// node that is nobody's child as root.
    pub fn create_nodes(document: &GltfDocument) -> Result<(Vec<SceneNode>, Vec<usize>), IngestError> {
        let node_count = document.nodes.len();
        let mut nodes = Vec::with_capacity(node_count);

        for node in &document.nodes {
            if let Some(mesh) = node.mesh.filter(|&mesh| mesh >= document.meshes.len()) {
                return Err(decode_error(format!("Mesh {} does not exist", mesh)));
            }

            if let Some(child) = node.children.iter().find(|&&child| child >= node_count) {
                return Err(decode_error(format!("Node {} does not exist", child)));
            }

            let transform = match node.matrix {
                Some(matrix) => Mat4::from_cols_array(&matrix),
                None => Mat4::from_scale_rotation_translation(
                    node.scale.map_or(Vec3::ONE, Vec3::from_array),
                    node.rotation.map_or(Quat::IDENTITY, Quat::from_array),
                    node.translation.map_or(Vec3::ZERO, Vec3::from_array),
                ),
            };

            nodes.push(SceneNode {
                name: node.name.clone(),
                mesh: node.mesh,
                transform,
                children: node.children.clone(),
            });
        }

        let roots = if document.scenes.is_empty() {
            let children: HashSet<usize> = document.nodes.iter().flat_map(|node| node.children.iter().copied()).collect();
            (0..node_count).filter(|index| !children.contains(index)).collect_vec()
        } else {
            let scene_index = document.scene.unwrap_or(0);
            let scene = document
                .scenes
                .get(scene_index)
                .ok_or_else(|| decode_error(format!("Scene {} does not exist", scene_index)))?;

            if let Some(root) = scene.nodes.iter().find(|&&root| root >= node_count) {
                return Err(decode_error(format!("Node {} does not exist", root)));
            }
            scene.nodes.clone()
        };

        Ok((nodes, roots))
    }
}

fn read_attribute(
    document: &GltfDocument,
    buffers: &[Vec<u8>],
    accessor: usize,
    accepted: &[AccessorType],
) -> Result<Vec<f32>, IngestError> {
    let accessor_type = document
        .accessors
        .get(accessor)
        .map(|accessor| accessor.accessor_type)
        .ok_or_else(|| decode_error(format!("Accessor {} does not exist", accessor)))?;

    if !accepted.contains(&accessor_type) {
        return Err(decode_error(format!("Accessor {} has unexpected type {:?}", accessor, accessor_type)));
    }

    GltfReader::read_floats(document, buffers, accessor).map_err(decode_error)
}
