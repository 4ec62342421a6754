use std::ffi::c_int;

use log::{debug, info};

use crate::{
    abi::SimulationAbi,
    error::{AdapterInitError, AdapterStepError, InitResult, StepResult},
    range::RangeSpec,
};

/// Upper limit for the sizes reported by the native module, anything above is treated
/// as garbage.
const MAX_VECTOR_LEN: i64 = 1 << 20;

/// The outcome of a single simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub reward: f32,
    pub done: bool,
}

/// A synchronous, single-threaded handle over one native simulation instance.
///
/// The adapter owns the scratch buffers lent to the native side; every returned vector is
/// a fresh copy so callers never alias them.
pub struct SimulationAdapter {
    abi: SimulationAbi,
    state_size: usize,
    action_size: usize,
    state_range: RangeSpec,
    action_range: RangeSpec,
    state_buf: Vec<f32>,
}

impl SimulationAdapter {
    /// Queries the native module for its vector sizes and ranges.
    ///
    /// # Arguments
    /// * `abi` - The native function table.
    ///
    /// # Returns
    /// A ready to use adapter or an `AdapterInitError` if the module reports invalid
    /// sizes or ranges.
    pub fn initialize(abi: SimulationAbi) -> InitResult<Self> {
        // SAFETY: The size queries take no arguments.
        let (state_size, action_size) = unsafe { ((abi.state_size)(), (abi.action_size)()) };
        let state_size = check_size("state", state_size)?;
        let action_size = check_size("action", action_size)?;

        let mut state_min = vec![0.0; state_size];
        let mut state_max = vec![0.0; state_size];
        let mut action_min = vec![0.0; action_size];
        let mut action_max = vec![0.0; action_size];

        // SAFETY: Each buffer has exactly the length the module just reported.
        unsafe {
            (abi.ranges)(
                state_min.as_mut_ptr(),
                state_max.as_mut_ptr(),
                action_min.as_mut_ptr(),
                action_max.as_mut_ptr(),
            )
        };

        let state_range = RangeSpec::from_native("state", &state_min, &state_max)?;
        let action_range = RangeSpec::from_native("action", &action_min, &action_max)?;

        info!(
            state_size = state_size,
            action_size = action_size;
            "simulation adapter initialized"
        );

        Ok(Self {
            abi,
            state_size,
            action_size,
            state_range,
            action_range,
            state_buf: vec![0.0; state_size],
        })
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    pub fn state_range(&self) -> &RangeSpec {
        &self.state_range
    }

    pub fn action_range(&self) -> &RangeSpec {
        &self.action_range
    }

    /// Resets the native simulation.
    ///
    /// # Returns
    /// The initial state of the new episode.
    pub fn reset(&mut self) -> Vec<f32> {
        self.state_buf.fill(0.0);

        // SAFETY: `state_buf` holds `state_size` floats and is not retained past the call.
        unsafe { (self.abi.reset)(self.state_buf.as_mut_ptr()) };

        debug!("simulation reset");
        self.state_buf.clone()
    }

    /// Advances the native simulation by one step. Actions are passed through as given,
    /// clamping them into the action range is the caller's job.
    ///
    /// # Arguments
    /// * `action` - A vector of `action_size` components.
    ///
    /// # Returns
    /// The next state, the reward and whether the episode ended, or an
    /// `AdapterStepError` on a length mismatch or a native fault.
    pub fn step(&mut self, action: &[f32]) -> StepResult<Transition> {
        if action.len() != self.action_size {
            return Err(AdapterStepError::ActionLength {
                got: action.len(),
                expected: self.action_size,
            });
        }

        self.state_buf.fill(0.0);
        let mut reward = [0.0_f32; 1];

        // SAFETY: `action` has `action_size` floats, `state_buf` has `state_size` floats
        //         and `reward` has one, none of them outlive the call.
        let code: c_int = unsafe {
            (self.abi.update)(
                action.as_ptr(),
                self.state_buf.as_mut_ptr(),
                reward.as_mut_ptr(),
            )
        };

        if code < 0 {
            return Err(AdapterStepError::NativeFault { code });
        }

        let [reward] = reward;
        if !reward.is_finite() {
            return Err(AdapterStepError::NonFiniteReward { reward });
        }

        Ok(Transition {
            state: self.state_buf.clone(),
            reward,
            done: code > 0,
        })
    }
}

fn check_size(what: &'static str, got: c_int) -> InitResult<usize> {
    let got = i64::from(got);
    if got <= 0 || got > MAX_VECTOR_LEN {
        return Err(AdapterInitError::InvalidSize { what, got });
    }

    Ok(got as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    unsafe extern "C" fn zero_size() -> c_int {
        0
    }

    unsafe extern "C" fn negative_size() -> c_int {
        -4
    }

    unsafe extern "C" fn two() -> c_int {
        2
    }

    unsafe extern "C" fn inverted_ranges(
        state_min: *mut f32,
        state_max: *mut f32,
        action_min: *mut f32,
        action_max: *mut f32,
    ) {
        unsafe {
            for i in 0..2 {
                *state_min.add(i) = -1.0;
                *state_max.add(i) = 1.0;
                *action_min.add(i) = 1.0;
                *action_max.add(i) = -1.0;
            }
        }
    }

    unsafe extern "C" fn nan_reward(_: *const f32, _: *mut f32, reward: *mut f32) -> c_int {
        unsafe { *reward = f32::NAN };
        0
    }

    fn abi_with(state_size: crate::abi::SizeFn, action_size: crate::abi::SizeFn) -> SimulationAbi {
        let base = mock::abi();
        unsafe {
            SimulationAbi::from_fns(
                state_size,
                action_size,
                base.ranges,
                base.reset,
                base.update,
            )
        }
    }

    #[test]
    fn rejects_zero_state_size() {
        let err = SimulationAdapter::initialize(abi_with(zero_size, two))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AdapterInitError::InvalidSize {
                what: "state",
                got: 0
            }
        ));
    }

    #[test]
    fn rejects_negative_action_size() {
        let err = SimulationAdapter::initialize(abi_with(two, negative_size))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AdapterInitError::InvalidSize {
                what: "action",
                got: -4
            }
        ));
    }

    #[test]
    fn rejects_inverted_action_range() {
        let base = mock::abi();
        let abi = unsafe {
            SimulationAbi::from_fns(two, two, inverted_ranges, base.reset, base.update)
        };
        let err = SimulationAdapter::initialize(abi).err().unwrap();
        assert!(matches!(
            err,
            AdapterInitError::InvalidRange { what: "action", .. }
        ));
    }

    #[test]
    fn exposes_translated_ranges() {
        let adapter = SimulationAdapter::initialize(mock::abi()).unwrap();
        assert_eq!(adapter.state_size(), mock::STATE_SIZE);
        assert_eq!(adapter.action_size(), mock::ACTION_SIZE);
        assert!(adapter.state_range().min().iter().all(|v| *v == f32::NEG_INFINITY));
        assert!(adapter.state_range().max().iter().all(|v| *v == f32::INFINITY));
        assert_eq!(adapter.action_range().bounds(0), (-1.0, 1.0));
    }

    #[test]
    fn step_returns_state_reward_and_done() {
        let mut adapter = SimulationAdapter::initialize(mock::abi()).unwrap();
        assert_eq!((adapter.state_size(), adapter.action_size()), (4, 2));

        let state = adapter.reset();
        assert!(adapter.state_range().contains(&state));

        let transition = adapter.step(&[0.5, -0.3]).unwrap();
        assert_eq!(transition.state.len(), 4);
        assert!(transition.reward.is_finite());
        assert!(!transition.done);
    }

    #[test]
    fn falling_ends_the_episode_without_error() {
        let mut adapter = SimulationAdapter::initialize(mock::abi()).unwrap();
        adapter.reset();

        let mut steps = 0;
        loop {
            let transition = adapter.step(&[0.0, -1.0]).unwrap();
            steps += 1;
            if transition.done {
                assert_eq!(transition.reward, 0.0);
                break;
            }
        }

        assert!(steps < mock::MAX_EPISODE_STEPS);
        let state = adapter.reset();
        assert_eq!(state[1], mock::START_HEIGHT);
    }

    #[test]
    fn step_checks_action_length() {
        let mut adapter = SimulationAdapter::initialize(mock::abi()).unwrap();
        adapter.reset();
        let err = adapter.step(&[0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            AdapterStepError::ActionLength {
                got: 3,
                expected: mock::ACTION_SIZE
            }
        );
    }

    #[test]
    fn negative_return_code_is_a_fault_not_done() {
        let mut adapter = SimulationAdapter::initialize(mock::abi()).unwrap();
        adapter.reset();
        let err = adapter.step(&[f32::NAN, 0.0]).unwrap_err();
        assert_eq!(err, AdapterStepError::NativeFault { code: mock::FAULT_CODE });
    }

    #[test]
    fn non_finite_reward_is_a_fault() {
        let base = mock::abi();
        let abi = unsafe {
            SimulationAbi::from_fns(
                base.state_size,
                base.action_size,
                base.ranges,
                base.reset,
                nan_reward,
            )
        };
        let mut adapter = SimulationAdapter::initialize(abi).unwrap();
        assert!(matches!(
            adapter.step(&[0.0, 0.0]),
            Err(AdapterStepError::NonFiniteReward { .. })
        ));
    }
}
