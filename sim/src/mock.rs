//! A point-mass "walker" served through the native ABI, used to exercise the adapter
//! without a compiled physics library.
//!
//! State layout: `[x, height, vx, vy]`. Action layout: `[horizontal thrust, vertical
//! thrust]`, each in `[-1, 1]`. The episode ends once the mass drops below the ground or
//! after `MAX_EPISODE_STEPS` steps. A NaN action component makes `update` fault.
//!
//! Every thread owns its own instance, just like each worker process owns its own copy of
//! a loaded physics library.

use std::{cell::RefCell, ffi::c_int, slice};

use crate::abi::SimulationAbi;

pub const STATE_SIZE: usize = 4;
pub const ACTION_SIZE: usize = 2;
pub const MAX_EPISODE_STEPS: u32 = 300;
pub const FAULT_CODE: i32 = -1;
pub const START_HEIGHT: f32 = 1.0;

const DT: f32 = 1.0 / 60.0;
const GRAVITY: f32 = 9.81;
const THRUST: f32 = 12.0;
const TARGET_VX: f32 = 1.0;

#[derive(Debug, Default, Clone, Copy)]
struct PointMass {
    x: f32,
    height: f32,
    vx: f32,
    vy: f32,
    steps: u32,
}

impl PointMass {
    fn write(&self, out: &mut [f32]) {
        out.copy_from_slice(&[self.x, self.height, self.vx, self.vy]);
    }
}

thread_local! {
    static SIM: RefCell<PointMass> = RefCell::new(PointMass::default());
}

unsafe extern "C" fn state_size() -> c_int {
    STATE_SIZE as c_int
}

unsafe extern "C" fn action_size() -> c_int {
    ACTION_SIZE as c_int
}

unsafe extern "C" fn ranges(
    state_min: *mut f32,
    state_max: *mut f32,
    action_min: *mut f32,
    action_max: *mut f32,
) {
    // SAFETY: Guaranteed by the ABI buffer contract.
    let (state_min, state_max, action_min, action_max) = unsafe {
        (
            slice::from_raw_parts_mut(state_min, STATE_SIZE),
            slice::from_raw_parts_mut(state_max, STATE_SIZE),
            slice::from_raw_parts_mut(action_min, ACTION_SIZE),
            slice::from_raw_parts_mut(action_max, ACTION_SIZE),
        )
    };

    state_min.fill(-9999.0);
    state_max.fill(9999.0);
    action_min.fill(-1.0);
    action_max.fill(1.0);
}

unsafe extern "C" fn reset(out_state: *mut f32) {
    // SAFETY: Guaranteed by the ABI buffer contract.
    let out_state = unsafe { slice::from_raw_parts_mut(out_state, STATE_SIZE) };

    SIM.with_borrow_mut(|sim| {
        *sim = PointMass {
            height: START_HEIGHT,
            ..Default::default()
        };
        sim.write(out_state);
    });
}

unsafe extern "C" fn update(action: *const f32, out_state: *mut f32, out_reward: *mut f32) -> c_int {
    // SAFETY: Guaranteed by the ABI buffer contract.
    let (action, out_state, out_reward) = unsafe {
        (
            slice::from_raw_parts(action, ACTION_SIZE),
            slice::from_raw_parts_mut(out_state, STATE_SIZE),
            &mut *out_reward,
        )
    };

    if action.iter().any(|a| a.is_nan()) {
        return FAULT_CODE;
    }

    SIM.with_borrow_mut(|sim| {
        sim.vx += action[0] * THRUST * DT;
        sim.vy += (action[1] * THRUST - GRAVITY) * DT;
        sim.x += sim.vx * DT;
        sim.height += sim.vy * DT;
        sim.steps += 1;
        sim.write(out_state);

        let fallen = sim.height < 0.0;
        *out_reward = if fallen {
            0.0
        } else {
            (-(sim.vx - TARGET_VX).powi(2)).exp()
        };

        (fallen || sim.steps >= MAX_EPISODE_STEPS) as c_int
    })
}

/// The function table of the point-mass simulation.
pub fn abi() -> SimulationAbi {
    // SAFETY: Every function above only touches the lengths fixed by the ABI contract.
    unsafe { SimulationAbi::from_fns(state_size, action_size, ranges, reset, update) }
}
