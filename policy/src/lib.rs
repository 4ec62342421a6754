//! The trained policy's parameters and its deterministic forward pass.

pub mod arch;
pub mod error;
mod extractor;
mod ops;
mod params;

pub use arch::{Activation, Block, FeatureExtractor, HIDDEN_LAYER_SIZE, LayerSpec, PolicyArch};
pub use error::{PolicyErr, Result};
pub use extractor::Extractor;
pub use ops::{Eager, PolicyOps};
pub use params::{FORMAT_VERSION, PolicyParameters, Tensor, element_count};
