use std::collections::VecDeque;

use log::debug;
use serde_json::json;

use crate::{Result, env::StepOutput};

/// Amount of trailing episodes averaged by `EpisodeMonitor::mean_reward`.
pub const MEAN_WINDOW: usize = 100;

/// The info key holding the summary of an episode that just finished.
pub const EPISODE_INFO: &str = "episode";

/// Summary of a finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Episode {
    pub reward: f64,
    pub length: usize,
}

/// Tracks episode returns and lengths across the workers of a `VecEnv`.
#[derive(Debug, Clone)]
pub struct EpisodeMonitor {
    returns: Vec<f64>,
    lengths: Vec<usize>,
    recent: VecDeque<Episode>,
    episode_count: u64,
    total_steps: u64,
}

impl EpisodeMonitor {
    /// Creates a new `EpisodeMonitor`.
    ///
    /// # Arguments
    /// * `num_envs` - The amount of workers whose outputs will be recorded.
    pub fn new(num_envs: usize) -> Self {
        Self {
            returns: vec![0.0; num_envs],
            lengths: vec![0; num_envs],
            recent: VecDeque::with_capacity(MEAN_WINDOW),
            episode_count: 0,
            total_steps: 0,
        }
    }

    /// Accounts one batch of step outputs. Finished episodes get their summary added to the
    /// output's info, a failed step drops the worker's partial episode.
    ///
    /// # Arguments
    /// * `outputs` - One step result per worker, as returned by `VecEnv::step_all`.
    pub fn record(&mut self, outputs: &mut [Result<StepOutput>]) {
        debug_assert_eq!(outputs.len(), self.returns.len());

        for (i, output) in outputs.iter_mut().enumerate() {
            let Ok(out) = output else {
                self.returns[i] = 0.0;
                self.lengths[i] = 0;
                continue;
            };

            self.total_steps += 1;
            self.returns[i] += f64::from(out.reward);
            self.lengths[i] += 1;

            if out.done {
                let episode = Episode {
                    reward: std::mem::take(&mut self.returns[i]),
                    length: std::mem::take(&mut self.lengths[i]),
                };

                out.info.insert(
                    EPISODE_INFO.to_string(),
                    json!({ "r": episode.reward, "l": episode.length }),
                );
                if self.recent.len() == MEAN_WINDOW {
                    self.recent.pop_front();
                }
                self.recent.push_back(episode);
                self.episode_count += 1;
            }
        }
    }

    /// The mean return over the last `MEAN_WINDOW` finished episodes, if any finished.
    pub fn mean_reward(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }

        let mean = self.recent.iter().map(|e| e.reward).sum::<f64>() / self.recent.len() as f64;

        debug!(
            episodes = self.episode_count,
            timesteps = self.total_steps,
            mean_reward = mean;
            "episode statistics"
        );

        Some(mean)
    }

    /// Amount of episodes finished since the monitor was created.
    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}
