/// Contrasting to the importers, that convert already parsed files into the scene IR, loaders are
/// a lot more high level. They call the parsers and pipe them into importers, and are what the
/// converter knows as `SceneDecoder`s.
pub mod fbx_loader;
pub mod gltf_loader;
pub mod obj_loader;
