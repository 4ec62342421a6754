use log::debug;
use serde_json::{Map, Value};
use sim::{RangeSpec, SimulationAbi, SimulationAdapter};

use crate::{EnvErr, Result, space::BoxSpace};

/// Free form per-step information, keyed by name.
pub type Info = Map<String, Value>;

/// What a single environment step hands back to the learner.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: Info,
}

/// The generic reinforcement learning environment contract consumed by a trainer.
pub trait Environment {
    fn observation_space(&self) -> &BoxSpace;

    fn action_space(&self) -> &BoxSpace;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Applies `action` and advances the episode by one step.
    fn step(&mut self, action: &[f32]) -> Result<StepOutput>;
}

/// The locomotion environment: a thin marshalling layer over a `SimulationAdapter`.
pub struct LocoEnv {
    adapter: SimulationAdapter,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl LocoEnv {
    /// Creates a new `LocoEnv` whose spaces come straight from the simulation's ranges.
    ///
    /// # Arguments
    /// * `abi` - The native simulation's function table.
    ///
    /// # Returns
    /// The environment or an `EnvErr::Init` if the adapter could not be initialized.
    pub fn new(abi: SimulationAbi) -> Result<Self> {
        let adapter = SimulationAdapter::initialize(abi)?;
        Ok(Self::from_adapter(adapter))
    }

    /// Wraps an already initialized adapter.
    pub fn from_adapter(adapter: SimulationAdapter) -> Self {
        let observation_space = BoxSpace::from(adapter.state_range());
        let action_space = BoxSpace::from(adapter.action_range());

        Self {
            adapter,
            observation_space,
            action_space,
        }
    }

    /// Replaces the action space by `[-bound, bound]` on every dimension, for trainers that
    /// work on a normalized action scale instead of the simulation's joint limits.
    ///
    /// # Arguments
    /// * `bound` - A finite, positive bound.
    ///
    /// # Returns
    /// The modified environment or an error if the bound is invalid.
    pub fn with_action_bound(mut self, bound: f32) -> Result<Self> {
        if !bound.is_finite() || bound <= 0.0 {
            return Err(EnvErr::InvalidBound { bound });
        }

        let range = RangeSpec::symmetric(self.adapter.action_size(), bound);
        self.action_space = BoxSpace::from(&range);
        Ok(self)
    }
}

impl Environment for LocoEnv {
    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        Ok(self.adapter.reset())
    }

    fn step(&mut self, action: &[f32]) -> Result<StepOutput> {
        let transition = self.adapter.step(action)?;
        if transition.done {
            debug!(reward = transition.reward; "episode finished");
        }

        Ok(StepOutput {
            observation: transition.state,
            reward: transition.reward,
            done: transition.done,
            info: Info::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use sim::{AdapterStepError, mock};

    use super::*;

    #[test]
    fn spaces_follow_the_simulation_ranges() {
        let env = LocoEnv::new(mock::abi()).unwrap();
        assert_eq!(env.observation_space().dim(), mock::STATE_SIZE);
        assert!(env.observation_space().low().iter().all(|v| v.is_infinite()));
        assert_eq!(env.action_space().low(), &[-1.0; mock::ACTION_SIZE]);
        assert_eq!(env.action_space().high(), &[1.0; mock::ACTION_SIZE]);
    }

    #[test]
    fn action_bound_override() {
        let env = LocoEnv::new(mock::abi())
            .unwrap()
            .with_action_bound(0.25)
            .unwrap();
        assert_eq!(env.action_space().high(), &[0.25; mock::ACTION_SIZE]);

        let err = LocoEnv::new(mock::abi())
            .unwrap()
            .with_action_bound(f32::INFINITY)
            .err()
            .unwrap();
        assert!(matches!(err, EnvErr::InvalidBound { .. }));
    }

    #[test]
    fn step_marshals_the_transition() {
        let mut env = LocoEnv::new(mock::abi()).unwrap();
        let obs = env.reset().unwrap();
        assert!(env.observation_space().contains(&obs));

        let out = env.step(&[0.5, -0.3]).unwrap();
        assert_eq!(out.observation.len(), mock::STATE_SIZE);
        assert!(!out.done);
        assert!(out.info.is_empty());
    }

    #[test]
    fn native_fault_is_reported() {
        let mut env = LocoEnv::new(mock::abi()).unwrap();
        env.reset().unwrap();
        let err = env.step(&[f32::NAN, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            EnvErr::Step(AdapterStepError::NativeFault { .. })
        ));
    }
}
