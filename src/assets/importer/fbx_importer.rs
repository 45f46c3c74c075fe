use std::collections::{HashMap, HashSet};

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};
use itertools::Itertools;
use log::{debug, trace, warn};
use meshport_files::fbx::types::{FbxDocument, FbxNode, FbxProperty, object_display_name};

use crate::assets::common::types::{Material, Mesh, Primitive, Scene, SceneNode, VertexBuffers};
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;

fn decode_error(err: impl std::fmt::Display) -> IngestError {
    IngestError::decode(SourceFormat::Fbx, err)
}

/// Object records carry `id, "Name\0\x01Class", subclass` as their first properties.
fn object_id(object: &FbxNode) -> Option<i64> {
    object.property(0).and_then(FbxProperty::as_i64)
}

fn object_name(object: &FbxNode) -> Option<String> {
    object
        .property(1)
        .and_then(FbxProperty::as_str)
        .map(object_display_name)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// `OO` connections as (child, parent) pairs, in file order.
fn object_connections(document: &FbxDocument) -> Vec<(i64, i64)> {
    document
        .node("Connections")
        .into_iter()
        .flat_map(|connections| connections.children_named("C"))
        .filter(|connection| connection.property(0).and_then(FbxProperty::as_str) == Some("OO"))
        .filter_map(|connection| {
            let child = connection.property(1).and_then(FbxProperty::as_i64)?;
            let parent = connection.property(2).and_then(FbxProperty::as_i64)?;
            Some((child, parent))
        })
        .collect_vec()
}

/// Looks up a `P` record inside `Properties70` and returns its value components.
fn property70(object: &FbxNode, name: &str) -> Option<Vec<f64>> {
    object
        .child("Properties70")?
        .children_named("P")
        .find(|property| property.property(0).and_then(FbxProperty::as_str) == Some(name))
        .map(|property| property.properties.iter().skip(4).filter_map(FbxProperty::as_f64).collect_vec())
}

fn property70_vec3(object: &FbxNode, name: &str) -> Option<Vec3> {
    property70(object, name)
        .filter(|values| values.len() >= 3)
        .map(|values| Vec3::new(values[0] as f32, values[1] as f32, values[2] as f32))
}

/// A `LayerElement*` of a geometry: per-vertex or per-corner attribute values.
struct LayerElement {
    values: Vec<f64>,
    indices: Option<Vec<i32>>,
    by_polygon_vertex: bool,
    all_same: bool,
    components: usize,
}

impl LayerElement {
    fn parse(geometry: &FbxNode, layer: &str, values: &str, index: &str, components: usize) -> Result<Option<Self>, IngestError> {
        let Some(element) = geometry.child(layer) else {
            return Ok(None);
        };

        let mapping = element
            .child("MappingInformationType")
            .and_then(|node| node.property(0))
            .and_then(FbxProperty::as_str)
            .unwrap_or("ByPolygonVertex");
        let (by_polygon_vertex, all_same) = match mapping {
            "ByPolygonVertex" => (true, false),
            "ByVertice" | "ByVertex" => (false, false),
            "AllSame" => (false, true),
            other => {
                warn!("Ignoring {} with unsupported mapping {}", layer, other);
                return Ok(None);
            }
        };

        let values = element
            .child(values)
            .and_then(|node| node.property(0))
            .and_then(FbxProperty::to_f64_vec)
            .ok_or_else(|| decode_error(format!("{} without values", layer)))?;

        let reference = element
            .child("ReferenceInformationType")
            .and_then(|node| node.property(0))
            .and_then(FbxProperty::as_str)
            .unwrap_or("Direct");
        let indices = match reference {
            "Direct" => None,
            _ => Some(
                element
                    .child(index)
                    .and_then(|node| node.property(0))
                    .and_then(FbxProperty::to_i32_vec)
                    .ok_or_else(|| decode_error(format!("{} without {}", layer, index)))?,
            ),
        };

        Ok(Some(Self {
            values,
            indices,
            by_polygon_vertex,
            all_same,
            components,
        }))
    }

    fn element_index(&self, polygon_vertex: usize, vertex: usize) -> Option<usize> {
        let position = match (self.all_same, self.by_polygon_vertex) {
            (true, _) => 0,
            (false, true) => polygon_vertex,
            (false, false) => vertex,
        };

        let element = match &self.indices {
            Some(indices) => usize::try_from(*indices.get(position)?).ok()?,
            None => position,
        };

        ((element + 1) * self.components <= self.values.len()).then_some(element)
    }

    fn value(&self, element: usize) -> &[f64] {
        &self.values[element * self.components..(element + 1) * self.components]
    }
}

pub struct FbxImporter {}

impl FbxImporter {
    pub fn import(document: &FbxDocument) -> Result<Scene, IngestError> {
        let connections = object_connections(document);
        let mut scene = Scene::default();

        let geometries: HashMap<i64, &FbxNode> = document
            .objects("Geometry")
            .filter_map(|geometry| object_id(geometry).map(|id| (id, geometry)))
            .collect();
        let models: HashMap<i64, &FbxNode> = document
            .objects("Model")
            .filter_map(|model| object_id(model).map(|id| (id, model)))
            .collect();

        let mut material_indices = HashMap::new();
        for material in document.objects("Material") {
            if let Some(id) = object_id(material) {
                material_indices.insert(id, scene.add_material(Self::create_material(material)));
            }
        }

        let mut mesh_indices = HashMap::new();
        let mut linked_geometries = HashSet::new();
        let mut node_indices = HashMap::new();

        // Models in file order, a model's node index is fixed before its children get linked.
        for model in document.objects("Model") {
            let Some(id) = object_id(model) else {
                continue;
            };

            let material = connections
                .iter()
                .find(|(child, parent)| *parent == id && material_indices.contains_key(child))
                .and_then(|(child, _)| material_indices.get(child).copied());

            let geometry = connections
                .iter()
                .find(|(child, parent)| *parent == id && geometries.contains_key(child))
                .map(|(child, _)| *child);

            let mesh = match geometry {
                Some(geometry_id) => {
                    linked_geometries.insert(geometry_id);
                    match mesh_indices.get(&(geometry_id, material)) {
                        Some(&mesh) => Some(mesh),
                        None => {
                            let mesh = Self::create_mesh(geometries[&geometry_id], material)?;
                            let mesh = scene.add_mesh(mesh);
                            mesh_indices.insert((geometry_id, material), mesh);
                            Some(mesh)
                        }
                    }
                }
                None => None,
            };

            let mut node = SceneNode::new(object_name(model), mesh);
            node.transform = Self::create_transform(model);
            node_indices.insert(id, scene.nodes.len());
            scene.nodes.push(node);
        }

        for (&id, &node) in node_indices.iter().sorted_by_key(|(_, node)| **node) {
            let parent = connections
                .iter()
                .find(|(child, parent)| *child == id && models.contains_key(parent))
                .and_then(|(_, parent)| node_indices.get(parent).copied())
                .filter(|&parent| parent != node);

            match parent {
                Some(parent) => scene.nodes[parent].children.push(node),
                None => scene.roots.push(node),
            }
        }

        // Geometry nobody instantiates is still content
        for geometry in document.objects("Geometry") {
            let Some(id) = object_id(geometry) else {
                continue;
            };
            if linked_geometries.contains(&id) {
                continue;
            }

            debug!("Geometry {:?} has no model, adding it as root", object_name(geometry));
            let mesh = scene.add_mesh(Self::create_mesh(geometry, None)?);
            scene.add_root(SceneNode::new(object_name(geometry), Some(mesh)));
        }

        if has_cycle(&scene) {
            return Err(decode_error("Model hierarchy contains a cycle"));
        }

        trace!(
            "FBX {} became {} nodes and {} meshes",
            document.version,
            scene.nodes.len(),
            scene.meshes.len()
        );
        Ok(scene)
    }

    /// Polygons from `PolygonVertexIndex` (a negative index closes a polygon, its value is
    /// `!index`), fan-triangulated. Normals and the first UV set follow their layer mapping.
    pub fn create_mesh(geometry: &FbxNode, material: Option<usize>) -> Result<Mesh, IngestError> {
        let name = object_name(geometry);

        let positions = geometry
            .child("Vertices")
            .and_then(|node| node.property(0))
            .and_then(FbxProperty::to_f64_vec)
            .ok_or_else(|| decode_error(format!("Geometry {:?} has no Vertices", name)))?;
        if positions.len() % 3 != 0 {
            return Err(decode_error("Vertices is not a list of triples"));
        }
        let position_count = positions.len() / 3;

        let polygon_indices = geometry
            .child("PolygonVertexIndex")
            .and_then(|node| node.property(0))
            .and_then(FbxProperty::to_i32_vec)
            .ok_or_else(|| decode_error(format!("Geometry {:?} has no PolygonVertexIndex", name)))?;

        let normals = LayerElement::parse(geometry, "LayerElementNormal", "Normals", "NormalsIndex", 3)?;
        let uvs = LayerElement::parse(geometry, "LayerElementUV", "UV", "UVIndex", 2)?;

        let mut welded: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
        let mut buffers = VertexBuffers::default();
        let mut index_buffer = Vec::new();
        let mut polygon = Vec::new();

        for (polygon_vertex, &raw) in polygon_indices.iter().enumerate() {
            let closes = raw < 0;
            let vertex = (if closes { !raw } else { raw }) as usize;
            if vertex >= position_count {
                return Err(decode_error(format!(
                    "Polygon vertex {} exceeds {} positions",
                    vertex, position_count
                )));
            }

            let normal = match &normals {
                Some(layer) => Some(
                    layer
                        .element_index(polygon_vertex, vertex)
                        .ok_or_else(|| decode_error("Normal index out of range"))?,
                ),
                None => None,
            };
            let uv = match &uvs {
                Some(layer) => Some(
                    layer
                        .element_index(polygon_vertex, vertex)
                        .ok_or_else(|| decode_error("UV index out of range"))?,
                ),
                None => None,
            };

            let next = buffers.position_buffer.len() as u32;
            let index = *welded.entry((vertex, normal, uv)).or_insert_with(|| {
                let p = &positions[vertex * 3..vertex * 3 + 3];
                buffers
                    .position_buffer
                    .push(Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32));

                if let (Some(layer), Some(normal)) = (&normals, normal) {
                    let n = layer.value(normal);
                    buffers
                        .normals_buffer
                        .push(Vec3::new(n[0] as f32, n[1] as f32, n[2] as f32).normalize_or_zero());
                }

                if let (Some(layer), Some(uv)) = (&uvs, uv) {
                    let t = layer.value(uv);
                    buffers.texcoord_buffer_0.push(Vec2::new(t[0] as f32, 1.0 - t[1] as f32));
                }

                next
            });
            polygon.push(index);

            if closes {
                for i in 1..polygon.len().saturating_sub(1) {
                    index_buffer.extend([polygon[0], polygon[i], polygon[i + 1]]);
                }
                polygon.clear();
            }
        }

        if !polygon.is_empty() {
            warn!("Geometry {:?} ends with an unterminated polygon, dropping it", name);
        }

        Ok(Mesh {
            name,
            primitives: vec![Primitive {
                vertex_buffers: buffers,
                index_buffer,
                material,
            }],
        })
    }

    /// `Lcl Translation * Lcl Rotation (degrees, XYZ order) * Lcl Scaling`
    pub fn create_transform(model: &FbxNode) -> Mat4 {
        let translation = property70_vec3(model, "Lcl Translation").unwrap_or(Vec3::ZERO);
        let rotation = property70_vec3(model, "Lcl Rotation").unwrap_or(Vec3::ZERO);
        let scale = property70_vec3(model, "Lcl Scaling").unwrap_or(Vec3::ONE);

        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            rotation.z.to_radians(),
            rotation.y.to_radians(),
            rotation.x.to_radians(),
        );
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }

    pub fn create_material(material: &FbxNode) -> Material {
        let diffuse = property70_vec3(material, "DiffuseColor").unwrap_or(Vec3::ONE);
        let opacity = property70(material, "Opacity")
            .and_then(|values| values.first().copied())
            .unwrap_or(1.0) as f32;

        Material {
            name: object_name(material),
            base_color_factor: Vec4::from((diffuse, opacity.clamp(0.0, 1.0))),
            metallic_factor: 0.0,
            ..Default::default()
        }
    }
}

fn has_cycle(scene: &Scene) -> bool {
    let mut visited = vec![false; scene.nodes.len()];
    let mut stack = scene.roots.clone();

    while let Some(node) = stack.pop() {
        if visited[node] {
            return true;
        }
        visited[node] = true;
        stack.extend(scene.nodes[node].children.iter().copied());
    }

    // Nodes that are neither reachable nor roots sit on a cycle
    visited.iter().any(|visited| !visited)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(value: &str) -> FbxProperty {
        FbxProperty::String(value.to_string())
    }

    fn object(kind: &str, id: i64, name: &str, children: Vec<FbxNode>) -> FbxNode {
        FbxNode::new(
            kind,
            vec![FbxProperty::I64(id), string(&format!("{}\x00\x01{}", name, kind)), string("Mesh")],
            children,
        )
    }

    fn vec3_property(name: &str, value: [f64; 3]) -> FbxNode {
        FbxNode::new(
            "P",
            vec![
                string(name),
                string("Lcl Translation"),
                string(""),
                string("A"),
                FbxProperty::F64(value[0]),
                FbxProperty::F64(value[1]),
                FbxProperty::F64(value[2]),
            ],
            vec![],
        )
    }

    fn connect(child: i64, parent: i64) -> FbxNode {
        FbxNode::new("C", vec![string("OO"), FbxProperty::I64(child), FbxProperty::I64(parent)], vec![])
    }

    fn quad_geometry(id: i64) -> FbxNode {
        object(
            "Geometry",
            id,
            "Quad",
            vec![
                FbxNode::new(
                    "Vertices",
                    vec![FbxProperty::F64Array(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0])],
                    vec![],
                ),
                FbxNode::new("PolygonVertexIndex", vec![FbxProperty::I32Array(vec![0, 1, 2, -4])], vec![]),
                FbxNode::new(
                    "LayerElementNormal",
                    vec![FbxProperty::I32(0)],
                    vec![
                        FbxNode::new("MappingInformationType", vec![string("ByPolygonVertex")], vec![]),
                        FbxNode::new("ReferenceInformationType", vec![string("Direct")], vec![]),
                        FbxNode::new("Normals", vec![FbxProperty::F64Array([0.0, 0.0, 2.0].repeat(4))], vec![]),
                    ],
                ),
            ],
        )
    }

    fn document() -> FbxDocument {
        let parent = object(
            "Model",
            10,
            "Parent",
            vec![FbxNode::new(
                "Properties70",
                vec![],
                vec![vec3_property("Lcl Translation", [1.0, 2.0, 3.0])],
            )],
        );
        let child = object(
            "Model",
            11,
            "Child",
            vec![FbxNode::new(
                "Properties70",
                vec![],
                vec![vec3_property("Lcl Rotation", [0.0, 0.0, 90.0])],
            )],
        );
        let material = object(
            "Material",
            20,
            "Red",
            vec![FbxNode::new(
                "Properties70",
                vec![],
                vec![vec3_property("DiffuseColor", [1.0, 0.0, 0.0])],
            )],
        );

        FbxDocument {
            version: 7400,
            nodes: vec![
                FbxNode::new("Objects", vec![], vec![quad_geometry(1), quad_geometry(2), parent, child, material]),
                FbxNode::new(
                    "Connections",
                    vec![],
                    vec![connect(1, 11), connect(20, 11), connect(11, 10), connect(10, 0)],
                ),
            ],
        }
    }

    #[test]
    fn builds_model_hierarchy() -> Result<(), anyhow::Error> {
        let scene = FbxImporter::import(&document())?;

        // two models plus the geometry nobody instantiates
        assert_eq!(scene.nodes.len(), 3);
        assert_eq!(scene.nodes[0].name.as_deref(), Some("Parent"));
        assert_eq!(scene.nodes[0].children, vec![1]);
        assert_eq!(scene.roots, vec![0, 2]);
        assert_eq!(scene.nodes[0].transform.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));

        let rotated = scene.nodes[1].transform.transform_vector3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::Y, 1e-5));

        let mesh = scene.nodes[1].mesh.map(|mesh| &scene.meshes[mesh]);
        let primitive = mesh.map(|mesh| &mesh.primitives[0]);
        assert_eq!(primitive.map(|p| p.index_buffer.clone()), Some(vec![0, 1, 2, 0, 2, 3]));
        assert_eq!(primitive.and_then(|p| p.material), Some(0));
        assert_eq!(scene.materials[0].base_color_factor, Vec4::new(1.0, 0.0, 0.0, 1.0));
        Ok(())
    }

    #[test]
    fn normals_follow_the_layer() -> Result<(), anyhow::Error> {
        let mesh = FbxImporter::create_mesh(&quad_geometry(1), None)?;
        let buffers = &mesh.primitives[0].vertex_buffers;
        assert_eq!(buffers.vertex_count(), 4);
        assert!(buffers.normals_buffer.iter().all(|normal| *normal == Vec3::Z));
        assert!(buffers.texcoord_buffer_0.is_empty());
        Ok(())
    }

    #[test]
    fn out_of_range_polygon_vertex_is_an_error() {
        let geometry = object(
            "Geometry",
            1,
            "Broken",
            vec![
                FbxNode::new("Vertices", vec![FbxProperty::F64Array(vec![0.0; 9])], vec![]),
                FbxNode::new("PolygonVertexIndex", vec![FbxProperty::I32Array(vec![0, 1, -6])], vec![]),
            ],
        );
        assert!(matches!(
            FbxImporter::create_mesh(&geometry, None),
            Err(IngestError::Decode { format: SourceFormat::Fbx, .. })
        ));
    }

    #[test]
    fn parent_cycles_are_rejected() {
        let mut document = document();
        document.nodes[1].children.push(connect(10, 11));
        document.nodes[1].children.retain(|connection| connection.property(2) != Some(&FbxProperty::I64(0)));
        assert!(FbxImporter::import(&document).is_err());
    }
}
