//! Locomotion bridge: drives a native physics simulation as a reinforcement learning
//! environment and turns the policy trained on it into artifacts a real-time runtime can
//! evaluate without the training stack.
//!
//! * [`sim`] wraps the native simulation behind its C ABI.
//! * [`loco_env`] presents it as an environment with bounded spaces, optionally many in
//!   parallel.
//! * [`policy`] holds the trained parameters and their deterministic forward pass.
//! * [`export`] serializes that forward pass as a traced graph or a static C table.
//! * [`orchestrator`] checkpoints and exports whenever training improves.

pub use export;
pub use loco_env;
pub use orchestrator;
pub use policy;
pub use sim;
