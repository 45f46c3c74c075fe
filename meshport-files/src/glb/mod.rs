/// Binary glTF (GLB): a 12 byte header followed by length-prefixed, typed chunks.
pub mod reader;
pub mod types;
pub mod writer;
