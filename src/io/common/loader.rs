use std::fmt::{Display, Formatter};

/// Extensions a primary file may carry, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["glb", "gltf", "fbx", "obj"];

pub trait ContentReader: Send + Sync {
    /// Case-insensitive check against [`SUPPORTED_EXTENSIONS`]. Never touches the content.
    fn is_supported(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Reads the whole file. Anything short of the complete content is an error.
    fn read_bytes(&self, file: &FileRef) -> std::io::Result<Vec<u8>>;

    /// Turns a reference into an owned [`SourceFile`], keeping name and relative path.
    fn read_source(&self, file: &FileRef) -> std::io::Result<SourceFile> {
        Ok(SourceFile {
            name: file.name.clone(),
            bytes: self.read_bytes(file)?,
            relative_path: file.relative_path.clone(),
        })
    }
}

/// A file that has not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Bare file name, e.g. `diffuse.png`. This is the cache key for primaries.
    pub name: String,
    /// Path relative to the dropped folder, e.g. `textures/diffuse.png`.
    pub relative_path: Option<String>,
    /// Reader specific: a filesystem path or an in-memory key.
    pub location: String,
}

impl FileRef {
    pub fn new(name: &str, relative_path: Option<&str>, location: &str) -> Self {
        Self {
            name: name.to_string(),
            relative_path: relative_path.map(str::to_string),
            location: location.to_string(),
        }
    }
}

impl Display for FileRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.relative_path {
            Some(path) if path != &self.name => write!(f, "{} ({})", self.name, path),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// A file whose content has been read completely.
#[derive(Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub relative_path: Option<String>,
}

impl SourceFile {
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            bytes,
            relative_path: None,
        }
    }

    pub fn with_relative_path(mut self, relative_path: &str) -> Self {
        self.relative_path = Some(relative_path.to_string());
        self
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ name: {}, relative_path: {:?}, bytes: [{}] }}",
            self.name,
            self.relative_path,
            self.bytes.len()
        )
    }
}

/// Lowercase extension after the last dot of the final path segment.
pub fn extension_of(file_name: &str) -> Option<String> {
    let base = basename(file_name);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Final segment of a `/` or `\` separated path.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// MIME type used when a companion ends up embedded in the container.
pub fn mime_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("bin") => "application/octet-stream",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
