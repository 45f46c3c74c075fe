/// The normalization pipeline: format detection, reference resolution, conversion, caching.
pub mod assets;
/// Where bytes come from: the filesystem or buffers the host already holds.
pub mod io;
pub mod settings;
