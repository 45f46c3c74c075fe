use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use log::trace;

use crate::io::common::loader::{ContentReader, FileRef};

/// Serves buffers the host already holds (drag and drop, network uploads, tests).
/// `FileRef::location` is the key the bytes were added under.
pub struct MemoryContentReader {
    files: DashMap<String, Arc<[u8]>>,
    reads: AtomicUsize,
}

impl MemoryContentReader {
    pub fn new() -> Self {
        Self {
            files: DashMap::with_capacity(16),
            reads: AtomicUsize::new(0),
        }
    }

    /// Stores `bytes` under `location` and returns a reference to it. Replaces earlier content.
    pub fn insert(&self, location: &str, bytes: Vec<u8>) -> FileRef {
        self.files.insert(location.to_string(), Arc::from(bytes));
        let name = crate::io::common::loader::basename(location);
        let relative_path = (name != location).then_some(location);
        FileRef::new(name, relative_path, location)
    }

    pub fn remove(&self, location: &str) -> bool {
        self.files.remove(location).is_some()
    }

    /// Number of successful `read_bytes` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl Default for MemoryContentReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentReader for MemoryContentReader {
    fn read_bytes(&self, file: &FileRef) -> std::io::Result<Vec<u8>> {
        let bytes = self.files.get(&file.location).map(|entry| entry.value().to_vec()).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has not been provided", file.location),
            )
        })?;

        self.reads.fetch_add(1, Ordering::Relaxed);
        trace!("Read {} from memory ({} bytes)", file.location, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_read_remove() -> Result<(), anyhow::Error> {
        let reader = MemoryContentReader::new();
        let file = reader.insert("textures/wood.png", vec![1, 2]);
        assert_eq!(file.name, "wood.png");
        assert_eq!(file.relative_path.as_deref(), Some("textures/wood.png"));

        assert_eq!(reader.read_bytes(&file)?, vec![1, 2]);
        assert_eq!(reader.reads(), 1);

        assert!(reader.remove("textures/wood.png"));
        assert!(reader.read_bytes(&file).is_err());
        assert_eq!(reader.reads(), 1);

        let flat = reader.insert("chair.obj", vec![]);
        assert_eq!(flat.relative_path, None);
        Ok(())
    }
}
