use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use log::{debug, error, info};

use meshport::assets::dispatcher::IngestionDispatcher;
use meshport::io::common::loader::{FileRef, extension_of};
use meshport::io::fs::loader::FsContentReader;
use meshport::settings::{CliArgs, PipelineSettings};

fn main() {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    if let Err(err) = run(&args) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let settings = PipelineSettings::from(args);
    let dispatcher = IngestionDispatcher::new(Arc::new(FsContentReader::new()), &settings);

    let primary = FsContentReader::file_ref(&args.primary);
    let companions = if args.companions.is_empty() && args.discover_companions {
        FsContentReader::discover_companions(&args.primary)
            .with_context(|| format!("Failed to list the files next to {}", args.primary.display()))?
    } else {
        args.companions
            .iter()
            .map(|path| companion_ref(&args.primary, path))
            .collect_vec()
    };

    info!("Ingesting {} with {} companions", primary, companions.len());
    let handle = dispatcher
        .ingest(&primary, &companions)
        .with_context(|| format!("Failed to ingest {}", primary))?;

    let output = args.output.clone().unwrap_or_else(|| default_output(&args.primary));
    fs::write(&output, handle.as_bytes()).with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Wrote {} ({} bytes)", output.display(), handle.len());
    debug!("{:?}, {:?}", dispatcher.stats(), dispatcher.cache().stats());
    Ok(())
}

/// Companions below the primary's directory keep their relative path, so `textures/wood.png`
/// references resolve exactly.
fn companion_ref(primary: &Path, path: &Path) -> FileRef {
    let mut file = FsContentReader::file_ref(path);
    file.relative_path = primary
        .parent()
        .and_then(|root| path.strip_prefix(root).ok())
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(|relative| relative.to_string_lossy().replace('\\', "/"));
    file
}

/// `model.obj` becomes `model.glb`, a `model.glb` input becomes `model.normalized.glb`.
fn default_output(primary: &Path) -> PathBuf {
    let file_name = primary.file_name().map(|name| name.to_string_lossy().to_string()).unwrap_or_default();
    match extension_of(&file_name).as_deref() {
        Some("glb") => primary.with_extension("normalized.glb"),
        _ => primary.with_extension("glb"),
    }
}
