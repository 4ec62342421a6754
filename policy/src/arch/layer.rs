use super::Activation;

/// The part of the actor network a linear layer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Layers shared by the actor and the critic.
    Shared,
    /// Layers private to the actor.
    Policy,
    /// The final linear map from the actor's latent to the raw action.
    Action,
}

impl Block {
    /// The name prefix of this block's tensors.
    pub fn prefix(&self) -> &'static str {
        match self {
            Block::Shared => "mlp_extractor.shared_net",
            Block::Policy => "mlp_extractor.policy_net",
            Block::Action => "action_net",
        }
    }
}

/// One linear layer of the deterministic path, with its optional activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub block: Block,
    /// Position of the layer inside its block.
    pub index: usize,
    pub fan_in: usize,
    pub fan_out: usize,
    pub activation: Option<Activation>,
}

impl LayerSpec {
    pub fn weight_name(&self) -> String {
        self.tensor_name("weight")
    }

    pub fn bias_name(&self) -> String {
        self.tensor_name("bias")
    }

    /// `(out, in)`, rows map to output units.
    pub fn weight_shape(&self) -> Vec<usize> {
        vec![self.fan_out, self.fan_in]
    }

    pub fn bias_shape(&self) -> Vec<usize> {
        vec![self.fan_out]
    }

    // Hidden blocks are sequences interleaving linear layers and activations, so the
    // linear layers sit at even positions.
    fn tensor_name(&self, kind: &str) -> String {
        match self.block {
            Block::Action => format!("{}.{kind}", self.block.prefix()),
            _ => format!("{}.{}.{kind}", self.block.prefix(), 2 * self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_layers_use_sequential_positions() {
        let layer = LayerSpec {
            block: Block::Policy,
            index: 1,
            fan_in: 128,
            fan_out: 64,
            activation: Some(Activation::Tanh),
        };

        assert_eq!(layer.weight_name(), "mlp_extractor.policy_net.2.weight");
        assert_eq!(layer.bias_name(), "mlp_extractor.policy_net.2.bias");
        assert_eq!(layer.weight_shape(), vec![64, 128]);
    }

    #[test]
    fn action_head_is_unindexed() {
        let layer = LayerSpec {
            block: Block::Action,
            index: 0,
            fan_in: 64,
            fan_out: 6,
            activation: None,
        };

        assert_eq!(layer.weight_name(), "action_net.weight");
        assert_eq!(layer.bias_name(), "action_net.bias");
    }
}
