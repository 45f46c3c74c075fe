use std::path::PathBuf;

use clap::Parser;

/// 500 MiB
pub const DEFAULT_CACHE_BUDGET: usize = 500 * 1024 * 1024;

const VERSION: &str = match option_env!("VERGEN_GIT_DESCRIBE") {
    Some(version) => version,
    None => "unknown",
};

#[derive(Parser, Debug)]
#[command(name = "meshport")]
#[command(version = VERSION)]
#[command(about = "Normalizes 3D assets (glTF, GLB, OBJ/MTL, FBX) into a single self-contained GLB")]
pub struct CliArgs {
    /// The file to convert (.glb, .gltf, .fbx or .obj)
    pub primary: PathBuf,

    /// Buffers, textures and material libraries the primary refers to
    pub companions: Vec<PathBuf>,

    /// Defaults to the primary's path with a .glb extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Upper bound for the in-memory conversion cache, in bytes
    #[arg(long, env = "MESHPORT_CACHE_BUDGET", default_value_t = DEFAULT_CACHE_BUDGET)]
    pub cache_budget: usize,

    /// Without explicit companions, pick up every file next to the primary (and in its direct subfolders)
    #[arg(long)]
    pub discover_companions: bool,

    /// Pass .glb files through without checking their header and chunks
    #[arg(long)]
    pub no_validate_passthrough: bool,

    /// Read companions one after another instead of on parallel threads
    #[arg(long)]
    pub sequential_reads: bool,
}

/// Library-side knobs, the CLI maps onto these.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub cache_budget_bytes: usize,
    /// Check the header and chunk layout of .glb inputs before passing them through.
    pub validate_passthrough: bool,
    /// Read companion files on scoped threads when there is more than one.
    pub concurrent_reads: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            validate_passthrough: true,
            concurrent_reads: true,
        }
    }
}

impl From<&CliArgs> for PipelineSettings {
    fn from(args: &CliArgs) -> Self {
        Self {
            cache_budget_bytes: args.cache_budget,
            validate_passthrough: !args.no_validate_passthrough,
            concurrent_reads: !args.sequential_reads,
        }
    }
}
