use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file's magic value does not match the expectation {magic:#010x}")]
    InvalidMagicValue { magic: u32 },

    #[error("The file is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    #[error("Unsupported format version {version}")]
    UnsupportedVersion { version: u32 },

    /// Text formats report the (1-based) line that could not be understood.
    #[error("Line {line}: {reason}")]
    SyntaxError { line: usize, reason: String },

    /// Represents an empty source, e.g. a zero byte OBJ file.
    #[error("Source contains no data")]
    EmptySource,

    /// Only relevant when writing: every length in a GLB is a u32.
    #[error("{what} of {size} bytes does not fit into a 32-bit length")]
    LengthOverflow { what: &'static str, size: usize },

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub mod common;
pub mod fbx;
pub mod glb;
pub mod gltf;
pub mod obj;
