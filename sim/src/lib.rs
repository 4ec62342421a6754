//! Adapter over a native physics simulation exposed through a small C ABI.
//!
//! The native module hands out fixed-size float vectors, declares their dynamic ranges
//! (with `9999` standing for "unbounded") and signals episode termination on every step.

mod abi;
mod adapter;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod range;

pub use abi::{RangesFn, ResetFn, SimulationAbi, SizeFn, UpdateFn};
pub use adapter::{SimulationAdapter, Transition};
pub use error::{AdapterInitError, AdapterStepError};
pub use range::{RangeSpec, UNBOUNDED_SENTINEL, translate_max, translate_min};
