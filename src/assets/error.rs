use std::fmt::Display;

use thiserror::Error;

use crate::assets::format::SourceFormat;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file format: \"{extension}\" (supported are .glb, .gltf, .fbx and .obj)")]
    UnsupportedFormat { extension: String },

    #[error("Failed to read {file}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Referenced file \"{uri}\" was not provided")]
    MissingReference { uri: String },

    #[error("Failed to decode {format}: {message}")]
    Decode { format: SourceFormat, message: String },

    #[error("Failed to encode the container: {message}")]
    Encode { message: String },

    #[error("Cache bookkeeping mismatch: tracked {tracked} bytes, entries sum up to {actual}")]
    CacheInvariant { tracked: usize, actual: usize },
}

impl IngestError {
    pub fn decode(format: SourceFormat, err: impl Display) -> Self {
        IngestError::Decode {
            format,
            message: err.to_string(),
        }
    }

    pub fn encode(err: impl Display) -> Self {
        IngestError::Encode {
            message: err.to_string(),
        }
    }
}
