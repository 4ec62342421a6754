//! The locomotion environment: the simulation adapter dressed up as a bounded-space
//! reinforcement learning environment, plus the parallel worker pool and episode
//! bookkeeping a trainer drives it with.

mod env;
pub mod error;
mod monitor;
mod space;
mod vec_env;

pub use env::{Environment, Info, LocoEnv, StepOutput};
pub use error::{EnvErr, Result};
pub use monitor::{EPISODE_INFO, Episode, EpisodeMonitor, MEAN_WINDOW};
pub use space::BoxSpace;
pub use vec_env::{TERMINAL_OBSERVATION, VecEnv};
