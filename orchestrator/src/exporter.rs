use std::{
    fs,
    path::PathBuf,
    sync::Arc,
};

use export::{Backend, ExportArtifact};
use log::{debug, info};
use parking_lot::RwLock;
use policy::{Extractor, PolicyArch, PolicyParameters};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::{Result, checkpoint, config::ExportConfig, write_all_atomic};

/// The parameters training keeps updating, shared with whoever exports them.
pub type SharedParameters = Arc<RwLock<PolicyParameters>>;

/// Wraps freshly created parameters for sharing.
pub fn share(params: PolicyParameters) -> SharedParameters {
    Arc::new(RwLock::new(params))
}

/// What a call to `ExportOrchestrator::on_step` did.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Not a check step, or no episode has finished yet.
    Skipped,
    /// The mean reward did not beat the best so far.
    NoImprovement { mean_reward: f64, best: f64 },
    /// A new best: the parameters were checkpointed.
    Checkpointed { mean_reward: f64, counter: usize },
    /// A new best that also triggered an export.
    Exported {
        mean_reward: f64,
        counter: usize,
        files: Vec<PathBuf>,
    },
}

/// Watches training progress and, whenever the policy improves, saves it and periodically
/// turns it into deployable artifacts.
#[derive(Debug)]
pub struct ExportOrchestrator {
    config: ExportConfig,
    arch: PolicyArch,
    best_mean_reward: f64,
    best_counter: usize,
    n_calls: usize,
}

impl ExportOrchestrator {
    /// Creates a new `ExportOrchestrator`.
    ///
    /// # Arguments
    /// * `config` - When and where to checkpoint and export.
    /// * `arch` - The architecture of the parameters being trained.
    ///
    /// # Returns
    /// The orchestrator or an error if the config is invalid or `log_dir` cannot be created.
    pub fn new(config: ExportConfig, arch: PolicyArch) -> Result<Self> {
        config.validate()?;
        arch.validate()?;
        fs::create_dir_all(&config.log_dir)?;

        Ok(Self {
            config,
            arch,
            best_mean_reward: f64::NEG_INFINITY,
            best_counter: 0,
            n_calls: 0,
        })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn best_mean_reward(&self) -> f64 {
        self.best_mean_reward
    }

    pub fn best_counter(&self) -> usize {
        self.best_counter
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    /// Called once per training step.
    ///
    /// Every `check_freq` calls, a mean reward above the best so far snapshots the
    /// parameters into a checkpoint, and every `trace_freq`-th such improvement also exports
    /// the snapshot.
    ///
    /// # Arguments
    /// * `mean_reward` - The mean return of the latest episodes, if any has finished.
    /// * `params` - The parameters being trained.
    ///
    /// # Returns
    /// What was done, or an error if checkpointing or exporting failed. A failed attempt
    /// still counts as the new best.
    pub fn on_step(
        &mut self,
        mean_reward: Option<f64>,
        params: &SharedParameters,
    ) -> Result<ExportOutcome> {
        self.n_calls += 1;
        if self.n_calls % self.config.check_freq != 0 {
            return Ok(ExportOutcome::Skipped);
        }

        let Some(mean_reward) = mean_reward else {
            debug!(n_calls = self.n_calls; "no finished episode yet");
            return Ok(ExportOutcome::Skipped);
        };

        info!(
            n_calls = self.n_calls,
            best = self.best_mean_reward,
            mean_reward = mean_reward;
            "checking progress"
        );

        if mean_reward <= self.best_mean_reward || mean_reward.is_nan() {
            return Ok(ExportOutcome::NoImprovement {
                mean_reward,
                best: self.best_mean_reward,
            });
        }

        self.best_mean_reward = mean_reward;
        self.best_counter += 1;

        let snapshot = params.read().clone();
        checkpoint::save_checkpoint(self.config.checkpoint_path(), &self.arch, &snapshot)?;

        if self.best_counter % self.config.trace_freq != 0 {
            return Ok(ExportOutcome::Checkpointed {
                mean_reward,
                counter: self.best_counter,
            });
        }

        let files = self.export_now(&snapshot)?;
        Ok(ExportOutcome::Exported {
            mean_reward,
            counter: self.best_counter,
            files,
        })
    }

    /// Builds, verifies and writes every configured artifact from `snapshot`.
    ///
    /// Nothing is written unless every artifact verifies, and every file is staged before
    /// any is replaced, so a failed export leaves the previous artifacts in place.
    ///
    /// # Returns
    /// The paths that were written.
    pub fn export_now(&self, snapshot: &PolicyParameters) -> Result<Vec<PathBuf>> {
        let extractor = Extractor::new(self.arch.clone(), snapshot)?;
        let example = self.example();

        let artifacts = self
            .config
            .backends
            .par_iter()
            .map(|backend| backend.export(&extractor, &example))
            .collect::<export::Result<Vec<ExportArtifact>>>()?;

        let encoded = artifacts
            .iter()
            .map(|artifact| -> Result<_> {
                Ok((self.artifact_path(artifact.backend()), artifact.to_bytes()?))
            })
            .collect::<Result<Vec<_>>>()?;

        write_all_atomic(
            encoded
                .iter()
                .map(|(path, bytes)| (path.as_path(), bytes.as_slice())),
        )?;

        let files: Vec<PathBuf> = encoded.into_iter().map(|(path, _)| path).collect();
        for path in &files {
            info!(path:? = path; "wrote artifact");
        }

        Ok(files)
    }

    pub fn artifact_path(&self, backend: Backend) -> PathBuf {
        self.config.log_dir.join(backend.file_name())
    }

    /// A representative observation: one standard normal draw per component, which is how
    /// an unbounded observation space samples.
    fn example(&self) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(self.config.example_seed);
        (0..self.arch.obs_dim())
            .map(|_| StandardNormal.sample(&mut rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn orchestrator(dir: &Path, check_freq: usize, trace_freq: usize) -> ExportOrchestrator {
        let config = ExportConfig {
            check_freq,
            trace_freq,
            log_dir: dir.to_path_buf(),
            ..Default::default()
        };
        ExportOrchestrator::new(config, PolicyArch::locomotion(4, 2)).unwrap()
    }

    fn params() -> SharedParameters {
        share(PolicyParameters::init(&PolicyArch::locomotion(4, 2), 0).unwrap())
    }

    #[test]
    fn only_every_check_freq_call_is_evaluated() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), 3, 5);
        let params = params();

        assert_eq!(orch.on_step(Some(1.0), &params).unwrap(), ExportOutcome::Skipped);
        assert_eq!(orch.on_step(Some(1.0), &params).unwrap(), ExportOutcome::Skipped);
        assert_eq!(
            orch.on_step(Some(1.0), &params).unwrap(),
            ExportOutcome::Checkpointed {
                mean_reward: 1.0,
                counter: 1
            }
        );
        assert_eq!(orch.n_calls(), 3);
        assert!(orch.config().checkpoint_path().exists());
    }

    #[test]
    fn no_episode_means_no_decision() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), 1, 1);

        assert_eq!(orch.on_step(None, &params()).unwrap(), ExportOutcome::Skipped);
        assert_eq!(orch.best_mean_reward(), f64::NEG_INFINITY);
        assert_eq!(orch.best_counter(), 0);
    }

    #[test]
    fn high_water_mark_only_rises() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), 1, 100);
        let params = params();

        orch.on_step(Some(2.0), &params).unwrap();
        assert_eq!(
            orch.on_step(Some(1.5), &params).unwrap(),
            ExportOutcome::NoImprovement {
                mean_reward: 1.5,
                best: 2.0
            }
        );
        assert_eq!(
            orch.on_step(Some(2.0), &params).unwrap(),
            ExportOutcome::NoImprovement {
                mean_reward: 2.0,
                best: 2.0
            }
        );
        assert!(matches!(
            orch.on_step(Some(f64::NAN), &params).unwrap(),
            ExportOutcome::NoImprovement { .. }
        ));
        assert_eq!(orch.best_mean_reward(), 2.0);
        assert_eq!(orch.best_counter(), 1);
    }

    #[test]
    fn every_trace_freq_improvement_exports() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(dir.path(), 1, 2);
        let params = params();

        assert!(matches!(
            orch.on_step(Some(0.1), &params).unwrap(),
            ExportOutcome::Checkpointed { counter: 1, .. }
        ));
        assert!(!dir.path().join("policy.graph").exists());

        let ExportOutcome::Exported { counter, files, .. } =
            orch.on_step(Some(0.2), &params).unwrap()
        else {
            panic!("the second improvement should export");
        };
        assert_eq!(counter, 2);
        assert_eq!(
            files,
            vec![dir.path().join("policy.graph"), dir.path().join("network.h")]
        );
        assert!(files.iter().all(|f| f.exists()));
    }
}
