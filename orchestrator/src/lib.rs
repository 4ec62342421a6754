//! Decides when a policy in training gets checkpointed and exported, and does both.

pub mod checkpoint;
pub mod config;
pub mod error;
mod exporter;

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use config::{CHECKPOINT_FILE, ExportConfig};
pub use error::{OrchestratorError, Result};
pub use exporter::{ExportOrchestrator, ExportOutcome, SharedParameters, share};

/// Replaces `path` with `data` in one step: the bytes go to a sibling temp file which is then
/// renamed over the target, so readers see either the old or the new contents.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    write_all_atomic([(path, data)])
}

/// Like `write_atomic` for several files at once. Every temp file is written before any
/// target is replaced, so a failed write leaves all targets untouched.
pub(crate) fn write_all_atomic<'a, I>(files: I) -> io::Result<()>
where
    I: IntoIterator<Item = (&'a Path, &'a [u8])>,
{
    let mut staged = Vec::new();
    for (path, data) in files {
        match stage(path, data) {
            Ok(temp_path) => staged.push((temp_path, path)),
            Err(e) => {
                discard(staged.iter().map(|(temp, _)| temp));
                return Err(e);
            }
        }
    }

    for (i, (temp_path, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(temp_path, path) {
            discard(staged[i..].iter().map(|(temp, _)| temp));
            return Err(e);
        }
    }

    Ok(())
}

fn stage(path: &Path, data: &[u8]) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{} is not a file path", path.display())))?;

    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });

    match written {
        Ok(()) => Ok(temp_path),
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn discard<'a>(temp_paths: impl Iterator<Item = &'a PathBuf>) {
    for temp_path in temp_paths {
        let _ = fs::remove_file(temp_path);
    }
}
