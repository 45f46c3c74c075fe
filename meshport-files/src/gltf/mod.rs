/// The glTF 2.0 JSON document model (serde) and accessor decoding.
pub mod reader;
pub mod types;
