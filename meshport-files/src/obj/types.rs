use crate::common::types::{ColorRgba, Vector2, Vector3};

#[derive(Debug, Clone, Default)]
pub struct ObjAsset {
    pub positions: Vec<Vector3>,
    /// Only populated when at least one `v` line carried a color (`v x y z r g b`), one per position.
    pub colors: Vec<ColorRgba>,
    pub tex_coords: Vec<Vector2>,
    pub normals: Vec<Vector3>,
    pub groups: Vec<ObjGroup>,
    /// File names from `mtllib` statements, in order of appearance.
    pub material_libraries: Vec<String>,
}

/// A run of faces sharing one object/group name and one material.
#[derive(Debug, Clone, Default)]
pub struct ObjGroup {
    pub name: String,
    pub material: Option<String>,
    pub faces: Vec<ObjFace>,
}

#[derive(Debug, Clone)]
pub struct ObjFace {
    /// At least three, in file order (counter-clockwise).
    pub vertices: Vec<FaceVertex>,
}

/// Zero-based indices into the asset's attribute lists, already bounds-checked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FaceVertex {
    pub position: usize,
    pub tex_coord: Option<usize>,
    pub normal: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MtlLibrary {
    pub materials: Vec<MtlMaterial>,
}

impl MtlLibrary {
    pub fn find(&self, name: &str) -> Option<&MtlMaterial> {
        self.materials.iter().find(|material| material.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct MtlMaterial {
    pub name: String,
    /// `Kd`, with the alpha taken from `d` (or `1 - Tr`)
    pub diffuse: ColorRgba,
    /// `Ns`
    pub specular_exponent: Option<f32>,
    /// `map_Kd`, as written in the file (usually relative to the .mtl)
    pub diffuse_map: Option<String>,
}

impl MtlMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            diffuse: ColorRgba::default(),
            specular_exponent: None,
            diffuse_map: None,
        }
    }
}
