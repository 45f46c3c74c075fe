/// Wavefront OBJ geometry and its MTL material libraries (text formats).
pub mod reader;
pub mod types;
