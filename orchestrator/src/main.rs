use std::{env, path::PathBuf};

use anyhow::Context;
use log::info;

use orchestrator::{ExportConfig, ExportOrchestrator, load_checkpoint};

/// Re-exports the artifacts of a saved checkpoint.
///
/// `EXPORT_CONFIG` points at a JSON `ExportConfig` (defaults when unset) and `CHECKPOINT` at
/// the checkpoint (the config's `best_model.safetensors` when unset).
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("EXPORT_CONFIG") {
        Ok(path) => ExportConfig::from_file(&path)
            .with_context(|| format!("failed to read the export config at {path}"))?,
        Err(_) => ExportConfig::default(),
    };

    let checkpoint = env::var("CHECKPOINT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config.checkpoint_path());

    let (arch, params) = load_checkpoint(&checkpoint)
        .with_context(|| format!("failed to load {}", checkpoint.display()))?;
    info!(checkpoint:? = checkpoint, tensors = params.len(); "loaded checkpoint");

    let orchestrator = ExportOrchestrator::new(config, arch)?;
    for path in orchestrator.export_now(&params)? {
        println!("{}", path.display());
    }

    Ok(())
}
