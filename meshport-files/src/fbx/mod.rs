/// Autodesk FBX, binary flavour only (7.x node-record trees).
pub mod reader;
pub mod types;
pub mod writer;

#[cfg(test)]
mod tests;
