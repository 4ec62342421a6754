use std::{fs, path::{Path, PathBuf}};

use export::Backend;
use serde::{Deserialize, Serialize};

use crate::{OrchestratorError, Result};

/// The file the best parameters so far are kept in, inside `log_dir`.
pub const CHECKPOINT_FILE: &str = "best_model.safetensors";

/// How and when the trained policy is checkpointed and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Evaluate the mean reward once every this many steps.
    pub check_freq: usize,
    /// Export artifacts on every this many-th improvement of the best mean reward.
    pub trace_freq: usize,
    /// Where checkpoints and artifacts are written.
    pub log_dir: PathBuf,
    pub backends: Vec<Backend>,
    /// Seed of the representative observation the artifacts are verified on.
    pub example_seed: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            check_freq: 1000,
            trace_freq: 5,
            log_dir: PathBuf::from("tmp/"),
            backends: vec![Backend::GraphTrace, Backend::StaticTable],
            example_seed: 0,
        }
    }
}

impl ExportConfig {
    /// Reads a JSON config, filling in defaults for the missing fields.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_freq == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "check_freq must be positive".into(),
            ));
        }

        if self.trace_freq == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "trace_freq must be positive".into(),
            ));
        }

        if self.backends.is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "at least one export backend is required".into(),
            ));
        }

        Ok(())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.log_dir.join(CHECKPOINT_FILE)
    }
}
