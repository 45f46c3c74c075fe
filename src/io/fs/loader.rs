use std::fs;
use std::io::Read;
use std::path::Path;

use itertools::Itertools;
use log::trace;

use crate::io::common::loader::{ContentReader, FileRef};

/// Reads files straight from disk, `FileRef::location` is the path.
pub struct FsContentReader {}

impl FsContentReader {
    pub fn new() -> Self {
        Self {}
    }

    pub fn file_ref(path: &Path) -> FileRef {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        FileRef {
            name,
            relative_path: None,
            location: path.to_string_lossy().to_string(),
        }
    }

    /// Every file next to `primary` (and one directory level below, e.g. `textures/`), except
    /// the primary itself, with paths relative to the primary's directory.
    pub fn discover_companions(primary: &Path) -> std::io::Result<Vec<FileRef>> {
        let root = primary.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));

        let companions = fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .flat_map(|entry| {
                let path = entry.path();
                if path.is_dir() {
                    return fs::read_dir(&path)
                        .map(|inner| {
                            inner
                                .filter_map(|file| file.ok())
                                .map(|file| file.path())
                                .filter(|file| file.is_file()) // no further recursion
                                .collect_vec()
                        })
                        .unwrap_or_default();
                }

                vec![path]
            })
            .filter(|path| path.file_name() != primary.file_name() || path.parent() != Some(root))
            .sorted()
            .map(|path| {
                let mut file = Self::file_ref(&path);
                let relative = path.strip_prefix(root).unwrap_or(&path);
                file.relative_path = Some(relative.to_string_lossy().replace('\\', "/"));
                file
            })
            .collect_vec();

        trace!("Discovered {} companions for {}", companions.len(), primary.display());
        Ok(companions)
    }
}

impl Default for FsContentReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentReader for FsContentReader {
    fn read_bytes(&self, file: &FileRef) -> std::io::Result<Vec<u8>> {
        let mut handle = fs::File::open(&file.location)?;
        let expected = handle.metadata()?.len() as usize;

        let mut buf = Vec::with_capacity(expected);
        handle.read_to_end(&mut buf)?;
        if buf.len() < expected {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{}: read {} of {} bytes", file.location, buf.len(), expected),
            ));
        }

        trace!("Read {} ({} bytes)", file.location, buf.len());
        Ok(buf)
    }
}
