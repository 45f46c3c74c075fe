/// Importers convert already parsed files into the scene IR (`assets::common::types`). They know
/// the file formats' data models, but nothing about where the bytes came from.
pub mod fbx_importer;
pub mod gltf_importer;
pub mod obj_importer;
