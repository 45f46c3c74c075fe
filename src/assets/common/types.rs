use std::fmt::{Debug, Formatter};

use glam::{Mat4, Vec2, Vec3, Vec4};

/// The intermediate representation between decoders and the encoder. Indices refer into the
/// vectors of the same scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

impl Scene {
    /// Adds a node without parent and returns its index.
    pub fn add_root(&mut self, node: SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.roots.push(index);
        index
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    /// Local, relative to the parent
    pub transform: Mat4,
    pub children: Vec<usize>,
}

impl SceneNode {
    pub fn new(name: Option<String>, mesh: Option<usize>) -> Self {
        Self {
            name,
            mesh,
            transform: Mat4::IDENTITY,
            children: vec![],
        }
    }
}

#[derive(Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

impl Debug for Mesh {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ name: {:?}, ", self.name)?;
        write!(f, "primitives: {:?} }}", self.primitives)
    }
}

#[derive(Clone, Default)]
pub struct Primitive {
    pub vertex_buffers: VertexBuffers,
    /// Triangle list
    pub index_buffer: Vec<u32>,
    pub material: Option<usize>,
}

impl Debug for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ vertex_buffers: {:?}, ", self.vertex_buffers)?;
        write!(f, "index_buffer: [{}], ", self.index_buffer.len())?;
        write!(f, "material: {:?} }}", self.material)
    }
}

/// Every non-empty buffer has exactly one element per position.
#[derive(Clone, Default)]
pub struct VertexBuffers {
    pub position_buffer: Vec<Vec3>,
    pub normals_buffer: Vec<Vec3>,
    pub texcoord_buffer_0: Vec<Vec2>,
    /// Linear RGBA
    pub vertex_color_0: Vec<Vec4>,
}

impl VertexBuffers {
    pub fn vertex_count(&self) -> usize {
        self.position_buffer.len()
    }
}

impl Debug for VertexBuffers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ position_buffer: [{}], ", self.position_buffer.len())?;
        write!(f, "normals_buffer: [{}], ", self.normals_buffer.len())?;
        write!(f, "texcoord_buffer_0: [{}], ", self.texcoord_buffer_0.len())?;
        write!(f, "vertex_color_0: [{}] }}", self.vertex_color_0.len())
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: Option<String>,
    /// Linear RGBA
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub base_color_texture: Option<usize>,
    pub double_sided: bool,
}

impl Default for Material {
    // glTF's defaults for pbrMetallicRoughness
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            base_color_texture: None,
            double_sided: false,
        }
    }
}

#[derive(Clone)]
pub struct Texture {
    pub name: Option<String>,
    pub mime_type: String,
    /// Still encoded (png, jpeg, ...)
    pub data: Vec<u8>,
}

impl Debug for Texture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ name: {:?}, mime_type: {}, data: [{}] }}",
            self.name,
            self.mime_type,
            self.data.len()
        )
    }
}
