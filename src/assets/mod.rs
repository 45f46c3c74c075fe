/// Bounded, insertion-ordered memo of finished containers.
pub mod cache;
/// The seams to the format specific code: `SceneDecoder` and `SceneEncoder`.
pub mod codec;
pub mod common;
/// GLB framing of an encoded scene.
pub mod container;
pub mod converter;
/// Entry point: cache lookup, reading, conversion, cache insert.
pub mod dispatcher;
pub mod error;
pub mod exporter;
pub mod format;
pub mod importer;
pub mod loader;
pub mod resolver;
