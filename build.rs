use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> anyhow::Result<()> {
    // Without a .git directory (source tarballs) vergen emits nothing, main.rs falls back to "unknown".
    let git = GitclBuilder::default()
        .sha(true)
        .branch(true)
        .describe(true, true, None)
        .build()?;

    Emitter::default().add_instructions(&git)?.emit()?;

    Ok(())
}
