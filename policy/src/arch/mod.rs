mod activation;
mod layer;

use serde::{Deserialize, Serialize};

pub use activation::Activation;
pub use layer::{Block, LayerSpec};

use crate::{PolicyErr, Result};

/// Width of the actor's hidden layers in the stock locomotion setup.
pub const HIDDEN_LAYER_SIZE: usize = 128;

/// How raw observations are turned into the trunk's input features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureExtractor {
    /// The observation is already a flat vector and passes through unchanged.
    #[default]
    Flatten,
}

/// The network architecture whose deterministic path gets exported, chosen at export time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyArch {
    /// An actor-critic MLP: features, then a trunk shared with the critic, then the actor's
    /// own hidden layers and a linear action head. The critic never takes part in acting.
    ActorCritic {
        obs_dim: usize,
        act_dim: usize,
        #[serde(default)]
        features: FeatureExtractor,
        #[serde(default)]
        shared: Vec<usize>,
        pi: Vec<usize>,
        activation: Activation,
    },
}

impl PolicyArch {
    /// The stock locomotion policy: no shared trunk, two tanh layers of
    /// `HIDDEN_LAYER_SIZE` units for the actor.
    pub fn locomotion(obs_dim: usize, act_dim: usize) -> Self {
        PolicyArch::ActorCritic {
            obs_dim,
            act_dim,
            features: FeatureExtractor::Flatten,
            shared: Vec::new(),
            pi: vec![HIDDEN_LAYER_SIZE, HIDDEN_LAYER_SIZE],
            activation: Activation::Tanh,
        }
    }

    pub fn obs_dim(&self) -> usize {
        match self {
            PolicyArch::ActorCritic { obs_dim, .. } => *obs_dim,
        }
    }

    pub fn act_dim(&self) -> usize {
        match self {
            PolicyArch::ActorCritic { act_dim, .. } => *act_dim,
        }
    }

    pub fn features(&self) -> FeatureExtractor {
        match self {
            PolicyArch::ActorCritic { features, .. } => *features,
        }
    }

    /// Checks that every width in the architecture is non zero.
    pub fn validate(&self) -> Result<()> {
        let PolicyArch::ActorCritic {
            obs_dim,
            act_dim,
            shared,
            pi,
            ..
        } = self;

        if *obs_dim == 0 || *act_dim == 0 {
            return Err(PolicyErr::BadArch(format!(
                "observation and action widths must be positive, got {obs_dim} and {act_dim}"
            )));
        }

        if shared.iter().chain(pi).any(|&w| w == 0) {
            return Err(PolicyErr::BadArch("hidden layers must not be empty".into()));
        }

        Ok(())
    }

    /// The linear layers of the deterministic path, in evaluation order.
    pub fn layers(&self) -> Vec<LayerSpec> {
        let PolicyArch::ActorCritic {
            obs_dim,
            act_dim,
            shared,
            pi,
            activation,
            ..
        } = self;

        let mut layers = Vec::with_capacity(shared.len() + pi.len() + 1);
        let mut fan_in = *obs_dim;

        for (block, widths) in [(Block::Shared, shared), (Block::Policy, pi)] {
            for (index, &fan_out) in widths.iter().enumerate() {
                layers.push(LayerSpec {
                    block,
                    index,
                    fan_in,
                    fan_out,
                    activation: Some(*activation),
                });
                fan_in = fan_out;
            }
        }

        layers.push(LayerSpec {
            block: Block::Action,
            index: 0,
            fan_in,
            fan_out: *act_dim,
            activation: None,
        });

        layers
    }

    /// The fixed order and shapes of the tensors the deterministic path reads.
    pub fn parameter_layout(&self) -> Vec<(String, Vec<usize>)> {
        self.layers()
            .into_iter()
            .flat_map(|layer| {
                [
                    (layer.weight_name(), layer.weight_shape()),
                    (layer.bias_name(), layer.bias_shape()),
                ]
            })
            .collect()
    }
}
