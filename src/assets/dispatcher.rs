use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, trace};

use crate::assets::cache::{AssetCache, AssetHandle};
use crate::assets::converter::FormatConverter;
use crate::assets::error::IngestError;
use crate::assets::format::SourceFormat;
use crate::io::common::loader::{ContentReader, FileRef, SourceFile, extension_of};
use crate::settings::PipelineSettings;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub hits: u64,
    pub misses: u64,
    /// Converter invocations that produced a container, passthroughs included.
    pub conversions: u64,
    pub failures: u64,
}

/// Turns dropped files into canonical containers, converting each primary file name only once as
/// long as its result stays cached. Can be shared between threads.
pub struct IngestionDispatcher {
    reader: Arc<dyn ContentReader>,
    converter: FormatConverter,
    cache: Arc<AssetCache>,
    concurrent_reads: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    conversions: AtomicU64,
    failures: AtomicU64,
}

impl IngestionDispatcher {
    pub fn new(reader: Arc<dyn ContentReader>, settings: &PipelineSettings) -> Self {
        Self::with_parts(
            reader,
            FormatConverter::new(settings),
            Arc::new(AssetCache::new(settings.cache_budget_bytes)),
            settings,
        )
    }

    /// For hosts that bring their own decoders or share one cache between dispatchers.
    pub fn with_parts(
        reader: Arc<dyn ContentReader>,
        converter: FormatConverter,
        cache: Arc<AssetCache>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            reader,
            converter,
            cache,
            concurrent_reads: settings.concurrent_reads,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            conversions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Returns the cached container for `primary.name`, or reads `primary` and all `companions`
    /// and converts them. The cache is only touched when the conversion succeeded.
    pub fn ingest(&self, primary: &FileRef, companions: &[FileRef]) -> Result<AssetHandle, IngestError> {
        if let Some(handle) = self.cached(&primary.name) {
            return Ok(handle);
        }

        if !self.reader.is_supported(&primary.name) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(IngestError::UnsupportedFormat {
                extension: extension_of(&primary.name).unwrap_or_default(),
            });
        }

        let (primary, companions) = self
            .read_all(primary, companions)
            .inspect_err(|_| {
                self.failures.fetch_add(1, Ordering::Relaxed);
            })?;

        self.convert_and_store(primary, companions)
    }

    /// Like [`IngestionDispatcher::ingest`], for bytes the host already holds.
    pub fn ingest_source(&self, primary: SourceFile, companions: Vec<SourceFile>) -> Result<AssetHandle, IngestError> {
        if let Some(handle) = self.cached(&primary.name) {
            return Ok(handle);
        }

        if let Err(err) = SourceFormat::from_file_name(&primary.name) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }

        self.convert_and_store(primary, companions)
    }

    fn cached(&self, name: &str) -> Option<AssetHandle> {
        match self.cache.get(name) {
            Some(handle) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {} ({} bytes)", name, handle.len());
                Some(handle)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache miss for {}", name);
                None
            }
        }
    }

    fn read(&self, file: &FileRef) -> Result<SourceFile, IngestError> {
        let source = self.reader.read_source(file).map_err(|source| IngestError::Read {
            file: file.to_string(),
            source,
        })?;

        trace!("Read {} ({} bytes)", file, source.bytes.len());
        Ok(source)
    }

    /// Every read has finished (or failed) when this returns, the first failure wins.
    fn read_all(&self, primary: &FileRef, companions: &[FileRef]) -> Result<(SourceFile, Vec<SourceFile>), IngestError> {
        let primary = self.read(primary)?;

        let companions = if self.concurrent_reads && companions.len() > 1 {
            thread::scope(|scope| {
                let reads = companions
                    .iter()
                    .map(|file| scope.spawn(move || self.read(file)))
                    .collect_vec();

                reads
                    .into_iter()
                    .map(|read| read.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect::<Result<Vec<_>, _>>()
            })?
        } else {
            companions
                .iter()
                .map(|file| self.read(file))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok((primary, companions))
    }

    fn convert_and_store(&self, primary: SourceFile, companions: Vec<SourceFile>) -> Result<AssetHandle, IngestError> {
        let name = primary.name.clone();
        let started = Instant::now();

        let bytes = self.converter.convert(primary, companions).inspect_err(|err| {
            self.failures.fetch_add(1, Ordering::Relaxed);
            debug!("Conversion of {} failed: {}", name, err);
        })?;
        self.conversions.fetch_add(1, Ordering::Relaxed);

        let handle = AssetHandle::new(bytes);
        self.cache.put(&name, handle.clone(), handle.len());

        info!("Ingested {} into {} bytes in {:?}", name, handle.len(), started.elapsed());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::loader::MemoryContentReader;

    const TRIANGLE: &[u8] = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn dispatcher(reader: Arc<MemoryContentReader>) -> IngestionDispatcher {
        IngestionDispatcher::new(reader, &PipelineSettings::default())
    }

    #[test]
    fn second_ingest_is_served_from_cache() -> Result<(), anyhow::Error> {
        let reader = Arc::new(MemoryContentReader::new());
        let primary = reader.insert("tri.obj", TRIANGLE.to_vec());
        let dispatcher = dispatcher(reader.clone());

        let first = dispatcher.ingest(&primary, &[])?;
        let second = dispatcher.ingest(&primary, &[])?;

        assert!(AssetHandle::ptr_eq(&first, &second));
        assert_eq!(reader.reads(), 1);
        assert_eq!(
            dispatcher.stats(),
            IngestStats {
                hits: 1,
                misses: 1,
                conversions: 1,
                failures: 0
            }
        );
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let reader = Arc::new(MemoryContentReader::new());
        let primary = reader.insert("model.xyz", vec![1, 2, 3]);
        let dispatcher = dispatcher(reader.clone());

        let result = dispatcher.ingest(&primary, &[]);
        assert!(matches!(result, Err(IngestError::UnsupportedFormat { extension }) if extension == "xyz"));
        assert_eq!(reader.reads(), 0);
        assert_eq!(dispatcher.stats().failures, 1);
    }

    #[test]
    fn failed_companion_read_leaves_cache_untouched() {
        let reader = Arc::new(MemoryContentReader::new());
        let primary = reader.insert("tri.obj", TRIANGLE.to_vec());
        let present = reader.insert("tri.mtl", b"newmtl a\nKd 1 0 0\n".to_vec());
        let missing = FileRef::new("gone.png", None, "gone.png");
        let dispatcher = dispatcher(reader);

        let result = dispatcher.ingest(&primary, &[present, missing]);
        assert!(matches!(result, Err(IngestError::Read { file, .. }) if file == "gone.png"));
        assert_eq!(dispatcher.cache().stats().entries, 0);
    }

    #[test]
    fn sequential_and_concurrent_reads_agree() -> Result<(), anyhow::Error> {
        let reader = Arc::new(MemoryContentReader::new());
        let primary = reader.insert("tri.obj", b"mtllib tri.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl red\nf 1 2 3\n".to_vec());
        let companions = [
            reader.insert("tri.mtl", b"newmtl red\nKd 1 0 0\nmap_Kd red.png\n".to_vec()),
            reader.insert("textures/red.png", vec![0x89, b'P', b'N', b'G']),
        ];

        let concurrent = dispatcher(reader.clone()).ingest(&primary, &companions)?;
        let settings = PipelineSettings {
            concurrent_reads: false,
            ..Default::default()
        };
        let sequential = IngestionDispatcher::new(reader, &settings).ingest(&primary, &companions)?;

        assert_eq!(concurrent.as_bytes(), sequential.as_bytes());
        Ok(())
    }

    #[test]
    fn ingest_source_uses_the_same_cache_key() -> Result<(), anyhow::Error> {
        let reader = Arc::new(MemoryContentReader::new());
        let dispatcher = dispatcher(reader.clone());

        let first = dispatcher.ingest_source(SourceFile::new("tri.obj", TRIANGLE.to_vec()), vec![])?;
        let primary = reader.insert("tri.obj", TRIANGLE.to_vec());
        let second = dispatcher.ingest(&primary, &[])?;

        assert!(AssetHandle::ptr_eq(&first, &second));
        assert_eq!(reader.reads(), 0);
        Ok(())
    }

    #[test]
    fn dispatcher_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IngestionDispatcher>();
    }
}
