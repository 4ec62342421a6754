use serde::{Deserialize, Serialize};

/// The nonlinearity applied after every hidden layer of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Tanh,
    Relu,
}
use Activation::*;

impl Activation {
    pub fn f(&self, x: f32) -> f32 {
        match self {
            Tanh => x.tanh(),
            Relu => x.max(0.0),
        }
    }

    /// The short name used in artifact headers.
    pub fn name(&self) -> &'static str {
        match self {
            Tanh => "tanh",
            Relu => "relu",
        }
    }
}
