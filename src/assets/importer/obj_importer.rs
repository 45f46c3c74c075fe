use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};
use log::{trace, warn};
use meshport_files::obj::types::{FaceVertex, MtlLibrary, MtlMaterial, ObjAsset, ObjGroup};

use crate::assets::common::types::{Material, Mesh, Primitive, Scene, SceneNode, Texture, VertexBuffers};
use crate::assets::resolver::PathIndex;
use crate::io::common::loader::mime_type_for;

pub struct ObjImporter {}

impl ObjImporter {
    /// One mesh and one root node per face group. Groups referring to a material that the library
    /// doesn't know get a default material of that name.
    pub fn import(asset: &ObjAsset, library: Option<&MtlLibrary>, companions: &PathIndex) -> Scene {
        let mut scene = Scene::default();
        let mut materials = MaterialTable::default();

        for group in asset.groups.iter().filter(|group| !group.faces.is_empty()) {
            let material = group
                .material
                .as_deref()
                .map(|name| materials.get_or_create(&mut scene, name, library, companions));

            let mesh = scene.add_mesh(Mesh {
                name: Some(group.name.clone()),
                primitives: vec![Self::create_primitive(asset, group, material)],
            });
            scene.add_root(SceneNode::new(Some(group.name.clone()), Some(mesh)));
        }

        trace!(
            "OBJ with {} positions became {} meshes and {} materials",
            asset.positions.len(),
            scene.meshes.len(),
            scene.materials.len()
        );
        scene
    }

    /// Welds identical position/uv/normal triplets and fan-triangulates every face.
    pub fn create_primitive(asset: &ObjAsset, group: &ObjGroup, material: Option<usize>) -> Primitive {
        let corners = || group.faces.iter().flat_map(|face| face.vertices.iter());
        let with_uv = corners().all(|vertex| vertex.tex_coord.is_some());
        let with_normals = corners().all(|vertex| vertex.normal.is_some());
        let with_colors = !asset.colors.is_empty();

        let mut welded: HashMap<FaceVertex, u32> = HashMap::new();
        let mut buffers = VertexBuffers::default();
        let mut index_buffer = Vec::new();

        for face in &group.faces {
            let mut face_indices = Vec::with_capacity(face.vertices.len());

            for vertex in &face.vertices {
                let next = buffers.position_buffer.len() as u32;
                let index = *welded.entry(*vertex).or_insert_with(|| {
                    buffers
                        .position_buffer
                        .push(Vec3::from_array(asset.positions[vertex.position].into()));

                    if let Some(uv) = vertex.tex_coord.filter(|_| with_uv) {
                        // OBJ has its origin bottom left
                        let uv = Vec2::from_array(asset.tex_coords[uv].into());
                        buffers.texcoord_buffer_0.push(Vec2::new(uv.x, 1.0 - uv.y));
                    }

                    if let Some(normal) = vertex.normal.filter(|_| with_normals) {
                        buffers
                            .normals_buffer
                            .push(Vec3::from_array(asset.normals[normal].into()).normalize_or_zero());
                    }

                    if with_colors {
                        let color = asset.colors.get(vertex.position).copied().unwrap_or_default();
                        buffers.vertex_color_0.push(Vec4::from_array(color.into()));
                    }

                    next
                });
                face_indices.push(index);
            }

            for i in 1..face_indices.len().saturating_sub(1) {
                index_buffer.extend([face_indices[0], face_indices[i], face_indices[i + 1]]);
            }
        }

        Primitive {
            vertex_buffers: buffers,
            index_buffer,
            material,
        }
    }

    /// Maps the Phong-ish MTL parameters onto metallic-roughness.
    pub fn create_material(material: &MtlMaterial) -> Material {
        Material {
            name: Some(material.name.clone()),
            base_color_factor: Vec4::from_array(material.diffuse.into()),
            metallic_factor: 0.0,
            roughness_factor: material
                .specular_exponent
                .map_or(1.0, |exponent| (2.0 / (exponent.max(0.0) + 2.0)).sqrt()),
            base_color_texture: None,
            double_sided: false,
        }
    }
}

#[derive(Default)]
struct MaterialTable {
    by_name: HashMap<String, usize>,
    /// blob URI to texture index, two materials sharing one map share the texture
    textures: HashMap<String, usize>,
}

impl MaterialTable {
    fn get_or_create(&mut self, scene: &mut Scene, name: &str, library: Option<&MtlLibrary>, companions: &PathIndex) -> usize {
        if let Some(&index) = self.by_name.get(name) {
            return index;
        }

        let material = match library.and_then(|library| library.find(name)) {
            Some(mtl) => {
                let mut material = ObjImporter::create_material(mtl);
                material.base_color_texture = mtl
                    .diffuse_map
                    .as_deref()
                    .and_then(|map| self.texture(scene, map, companions));
                material
            }
            None => {
                warn!("Material {} is not defined, using defaults", name);
                Material {
                    name: Some(name.to_string()),
                    metallic_factor: 0.0,
                    ..Default::default()
                }
            }
        };

        let index = scene.add_material(material);
        self.by_name.insert(name.to_string(), index);
        index
    }

    fn texture(&mut self, scene: &mut Scene, map: &str, companions: &PathIndex) -> Option<usize> {
        let Some(handle) = companions.lookup(map) else {
            warn!("Texture {} was not provided, the material stays untextured", map);
            return None;
        };

        if let Some(&index) = self.textures.get(handle.uri()) {
            return Some(index);
        }

        let index = scene.add_texture(Texture {
            name: Some(handle.name().to_string()),
            mime_type: mime_type_for(handle.name()).to_string(),
            data: handle.bytes().to_vec(),
        });
        self.textures.insert(handle.uri().to_string(), index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use meshport_files::obj::reader::ObjReader;

    use super::*;
    use crate::assets::resolver::FileBag;

    const QUADS: &[u8] = b"\
mtllib quads.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 0 0
v 2 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
o left
usemtl wood
f 1/1 2/2 3/3 4/4
o right
usemtl ghost
f 2/1 5/2 6/3 3/4
";

    const MTL: &[u8] = b"newmtl wood\nKd 0.5 0.25 0\nNs 98\nmap_Kd textures/wood.png\n";

    fn import(companions: &FileBag) -> Result<Scene, anyhow::Error> {
        let asset = ObjReader::parse_asset(&mut Cursor::new(QUADS))?;
        let library = ObjReader::parse_material_library(&mut Cursor::new(MTL))?;
        Ok(ObjImporter::import(&asset, Some(&library), &PathIndex::build(companions)))
    }

    #[test]
    fn one_mesh_per_group_with_fans() -> Result<(), anyhow::Error> {
        let scene = import(&FileBag::new())?;

        assert_eq!(scene.roots, vec![0, 1]);
        assert_eq!(scene.meshes.len(), 2);
        let left = &scene.meshes[0].primitives[0];
        assert_eq!(left.vertex_buffers.vertex_count(), 4);
        assert_eq!(left.index_buffer, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(left.vertex_buffers.texcoord_buffer_0[0], Vec2::new(0.0, 1.0));
        assert!(left.vertex_buffers.normals_buffer.is_empty());
        Ok(())
    }

    #[test]
    fn materials_come_from_the_library_or_defaults() -> Result<(), anyhow::Error> {
        let mut bag = FileBag::new();
        bag.insert("wood.png", vec![0x89, b'P', b'N', b'G'], None);
        let scene = import(&bag)?;

        assert_eq!(scene.materials.len(), 2);
        let wood = &scene.materials[0];
        assert_eq!(wood.base_color_factor, Vec4::new(0.5, 0.25, 0.0, 1.0));
        assert_eq!(wood.base_color_texture, Some(0));
        assert!(wood.roughness_factor < 0.2);
        assert_eq!(scene.textures[0].mime_type, "image/png");

        let ghost = &scene.materials[1];
        assert_eq!(ghost.name.as_deref(), Some("ghost"));
        assert_eq!(ghost.base_color_factor, Vec4::ONE);
        Ok(())
    }

    #[test]
    fn missing_texture_leaves_material_untextured() -> Result<(), anyhow::Error> {
        let scene = import(&FileBag::new())?;
        assert!(scene.textures.is_empty());
        assert_eq!(scene.materials[0].base_color_texture, None);
        Ok(())
    }
}
