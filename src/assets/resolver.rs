use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};
use meshport_files::gltf::types::GltfDocument;

use crate::io::common::loader::{SourceFile, basename};

static NEXT_BLOB_ID: AtomicU64 = AtomicU64::new(1);

pub const BLOB_URI_PREFIX: &str = "blob:meshport/";

/// Companion files of one conversion call, keyed by file name. Keeps the order in which names
/// were first added, a repeated name replaces the bytes in place.
#[derive(Debug, Default)]
pub struct FileBag {
    entries: Vec<(String, BagEntry)>,
}

#[derive(Debug, Clone)]
pub struct BagEntry {
    pub bytes: Arc<Vec<u8>>,
    pub relative_path: Option<String>,
}

impl FileBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>, relative_path: Option<String>) {
        let entry = BagEntry {
            bytes: Arc::new(bytes),
            relative_path,
        };

        match self.entries.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = entry,
            None => self.entries.push((name.to_string(), entry)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&BagEntry> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, entry)| entry)
    }

    /// The first entry (in insertion order) whose name ends with `.{extension}`, case-insensitive.
    pub fn find_by_extension(&self, extension: &str) -> Option<(&str, &BagEntry)> {
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        self.entries
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase().ends_with(&suffix))
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BagEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<SourceFile>> for FileBag {
    fn from(files: Vec<SourceFile>) -> Self {
        let mut bag = FileBag::new();
        for file in files {
            bag.insert(&file.name, file.bytes, file.relative_path);
        }
        bag
    }
}

/// In-process bytes behind a unique `blob:` URI.
#[derive(Debug, Clone)]
pub struct BlobHandle {
    uri: String,
    /// The companion the bytes came from, used to guess MIME types.
    name: String,
    bytes: Arc<Vec<u8>>,
}

impl BlobHandle {
    pub fn new(name: &str, bytes: Arc<Vec<u8>>) -> Self {
        let id = NEXT_BLOB_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            uri: format!("{}{}", BLOB_URI_PREFIX, id),
            name: name.to_string(),
            bytes,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Arc<Vec<u8>> {
        &self.bytes
    }
}

/// Every lookup key a companion can be referenced by (file name, relative path and the relative
/// path's basename) mapped to its blob. Later registrations overwrite earlier ones, ambiguous
/// basenames therefore resolve to the companion that was registered last.
#[derive(Debug, Default)]
pub struct PathIndex {
    by_key: HashMap<String, BlobHandle>,
}

impl PathIndex {
    pub fn build(bag: &FileBag) -> Self {
        let mut index = PathIndex::default();

        for (name, entry) in bag.iter() {
            let handle = BlobHandle::new(name, entry.bytes.clone());
            index.register(name, &handle);

            if let Some(relative_path) = entry.relative_path.as_deref().filter(|path| *path != name) {
                index.register(relative_path, &handle);

                let base = basename(relative_path);
                if base != name {
                    index.register(base, &handle);
                }
            }
        }

        debug!("Indexed {} companions under {} keys", bag.len(), index.by_key.len());
        index
    }

    fn register(&mut self, key: &str, handle: &BlobHandle) {
        if let Some(previous) = self.by_key.insert(key.to_string(), handle.clone()) {
            debug!("{} now refers to {} instead of {}", key, handle.name, previous.name);
        }
    }

    /// Exact key, then the percent-decoded key, then the basename of either.
    pub fn lookup(&self, reference: &str) -> Option<&BlobHandle> {
        let decoded = urlencoding::decode(reference).ok();
        let decoded = decoded.as_deref().filter(|decoded| *decoded != reference);

        self.by_key
            .get(reference)
            .or_else(|| decoded.and_then(|decoded| self.by_key.get(decoded)))
            .or_else(|| self.by_key.get(basename(reference)))
            .or_else(|| decoded.and_then(|decoded| self.by_key.get(basename(decoded))))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResolutionReport {
    /// (original URI, blob URI)
    pub resolved: Vec<(String, String)>,
    pub unresolved: Vec<String>,
}

/// A document whose buffer and image URIs point at in-process blobs wherever a companion matched.
#[derive(Debug)]
pub struct ResolvedDocument {
    pub document: GltfDocument,
    pub blobs: HashMap<String, BlobHandle>,
    pub report: ResolutionReport,
}

impl ResolvedDocument {
    pub fn blob(&self, uri: &str) -> Option<&BlobHandle> {
        self.blobs.get(uri)
    }
}

pub struct ReferenceResolver {}

impl ReferenceResolver {
    /// Rewrites every resolvable `buffers[].uri` and `images[].uri`. `data:` URIs stay untouched,
    /// unresolvable ones are left as they are and reported; decoding fails on them later.
    pub fn resolve(mut document: GltfDocument, index: &PathIndex) -> ResolvedDocument {
        let mut report = ResolutionReport::default();
        let mut blobs = HashMap::new();

        let uris = document
            .buffers
            .iter_mut()
            .filter_map(|buffer| buffer.uri.as_mut())
            .chain(document.images.iter_mut().filter_map(|image| image.uri.as_mut()));

        for uri in uris {
            if uri.starts_with("data:") {
                continue;
            }

            match index.lookup(uri) {
                Some(handle) => {
                    trace!("Resolved {} to {} ({})", uri, handle.uri(), handle.name());
                    report.resolved.push((uri.clone(), handle.uri().to_string()));
                    blobs.insert(handle.uri().to_string(), handle.clone());
                    *uri = handle.uri().to_string();
                }
                None => {
                    warn!("No companion file matches {}", uri);
                    report.unresolved.push(uri.clone());
                }
            }
        }

        debug!(
            "Resolved {} references, {} unresolved",
            report.resolved.len(),
            report.unresolved.len()
        );

        ResolvedDocument {
            document,
            blobs,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use meshport_files::gltf::reader::GltfReader;

    use super::*;

    fn bag(entries: &[(&str, u8, Option<&str>)]) -> FileBag {
        let mut bag = FileBag::new();
        for &(name, byte, relative_path) in entries {
            bag.insert(name, vec![byte], relative_path.map(str::to_string));
        }
        bag
    }

    #[test]
    fn registers_name_path_and_basename() {
        let bag = bag(&[("wood.png", 1, Some("textures/wood.png")), ("a.bin", 2, Some("a.bin"))]);
        let index = PathIndex::build(&bag);

        assert!(index.contains_key("wood.png"));
        assert!(index.contains_key("textures/wood.png"));
        assert!(index.contains_key("a.bin"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn renamed_companion_registers_its_basename_too() {
        let bag = bag(&[("upload-1.png", 1, Some("textures/diffuse.png"))]);
        let index = PathIndex::build(&bag);
        assert!(index.contains_key("upload-1.png"));
        assert!(index.contains_key("textures/diffuse.png"));
        assert!(index.contains_key("diffuse.png"));
    }

    #[test]
    fn basename_fallback_and_percent_decoding() {
        let bag = bag(&[("diffuse.png", 7, None), ("my scene.bin", 8, None)]);
        let index = PathIndex::build(&bag);

        let handle = index.lookup("textures/diffuse.png").map(|handle| handle.bytes().to_vec());
        assert_eq!(handle, Some(vec![7]));
        assert!(index.lookup("..\\textures\\diffuse.png").is_some());
        assert!(index.lookup("my%20scene.bin").is_some());
        assert!(index.lookup("data/my%20scene.bin").is_some());
        assert!(index.lookup("normal.png").is_none());
    }

    #[test]
    fn last_registered_wins_on_collisions() {
        let bag = bag(&[("diffuse.png", 1, None), ("other.png", 2, Some("textures/diffuse.png"))]);
        let index = PathIndex::build(&bag);

        let winner = index.lookup("diffuse.png").map(|handle| handle.name().to_string());
        assert_eq!(winner.as_deref(), Some("other.png"));
    }

    #[test]
    fn repeated_names_replace_in_place() {
        let bag = bag(&[("a.bin", 1, None), ("b.bin", 2, None), ("a.bin", 3, None)]);
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get("a.bin").map(|entry| entry.bytes.to_vec()), Some(vec![3]));
        assert_eq!(bag.iter().next().map(|(name, _)| name), Some("a.bin"));
        assert_eq!(bag.find_by_extension("BIN").map(|(name, _)| name), Some("a.bin"));
    }

    #[test]
    fn resolves_buffers_and_images() -> Result<(), anyhow::Error> {
        let document = GltfReader::parse_document(
            br#"{
              "asset": { "version": "2.0" },
              "buffers": [
                { "uri": "scene.bin", "byteLength": 1 },
                { "uri": "data:application/octet-stream;base64,AA==", "byteLength": 1 }
              ],
              "images": [{ "uri": "textures/diffuse.png" }, { "uri": "missing.png" }]
            }"#,
        )?;

        let bag = bag(&[("scene.bin", 1, None), ("diffuse.png", 2, None)]);
        let index = PathIndex::build(&bag);
        let resolved = ReferenceResolver::resolve(document, &index);

        let buffer_uri = resolved.document.buffers[0].uri.clone().unwrap_or_default();
        assert!(buffer_uri.starts_with(BLOB_URI_PREFIX));
        assert_eq!(resolved.blob(&buffer_uri).map(|blob| blob.bytes().to_vec()), Some(vec![1]));
        assert!(resolved.document.buffers[1].uri.as_deref().is_some_and(|uri| uri.starts_with("data:")));
        assert!(resolved.document.images[0].uri.as_deref().is_some_and(|uri| uri.starts_with(BLOB_URI_PREFIX)));
        assert_eq!(resolved.document.images[1].uri.as_deref(), Some("missing.png"));
        assert_eq!(resolved.report.resolved.len(), 2);
        assert_eq!(resolved.report.unresolved, vec!["missing.png".to_string()]);
        Ok(())
    }
}
