use log::debug;
use ndarray::{Array2, ArrayView2};

use crate::{
    PolicyErr, Result,
    arch::PolicyArch,
    ops::{Eager, PolicyOps},
    params::PolicyParameters,
};

/// The deterministic decision function of a trained policy: observation in, raw action out.
///
/// Holds its own copy of the parameters it reads, so later changes made by training never
/// leak into an extractor that was already built.
#[derive(Debug, Clone)]
pub struct Extractor {
    arch: PolicyArch,
    params: PolicyParameters,
}

impl Extractor {
    /// Creates a new `Extractor`.
    ///
    /// # Arguments
    /// * `arch` - The architecture the parameters were trained with.
    /// * `params` - The trained parameters, possibly including tensors the actor never reads.
    ///
    /// # Returns
    /// The extractor or an error if the parameters do not fit `arch`.
    pub fn new(arch: PolicyArch, params: &PolicyParameters) -> Result<Self> {
        let params = params.select(&arch)?;
        params.check_chain()?;

        debug!(
            obs_dim = arch.obs_dim(),
            act_dim = arch.act_dim(),
            tensors = params.len();
            "built policy extractor"
        );

        Ok(Self { arch, params })
    }

    pub fn arch(&self) -> &PolicyArch {
        &self.arch
    }

    /// The tensors of the deterministic path, in layout order.
    pub fn parameters(&self) -> &PolicyParameters {
        &self.params
    }

    /// Runs the forward definition through any backend.
    ///
    /// features, shared trunk, policy head, then the linear action head. Hidden layers
    /// apply the activation, the action head does not.
    ///
    /// # Arguments
    /// * `ops` - The backend that evaluates or records the operations.
    /// * `input` - The observation as the backend represents it.
    ///
    /// # Returns
    /// The raw action as the backend represents it.
    pub fn run<O: PolicyOps>(&self, ops: &mut O, input: O::Value) -> Result<O::Value> {
        let mut x = ops.features(input, self.arch.features())?;

        for (layer, pair) in self.arch.layers().iter().zip(self.params.tensors().chunks(2)) {
            let [weight, bias] = pair else {
                return Err(PolicyErr::MissingTensor {
                    name: layer.bias_name(),
                });
            };

            x = ops.linear(x, weight, bias)?;
            if let Some(activation) = layer.activation {
                x = ops.activation(x, activation)?;
            }
        }

        Ok(x)
    }

    /// Evaluates the policy on a single observation.
    pub fn forward(&self, obs: &[f32]) -> Result<Vec<f32>> {
        let batch = ArrayView2::from_shape((1, obs.len()), obs).map_err(|_| PolicyErr::Input {
            got: obs.len(),
            expected: self.arch.obs_dim(),
        })?;

        Ok(self.forward_batch(batch)?.iter().copied().collect())
    }

    /// Evaluates the policy on a batch of observations, one per row.
    pub fn forward_batch(&self, obs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if obs.ncols() != self.arch.obs_dim() {
            return Err(PolicyErr::Input {
                got: obs.ncols(),
                expected: self.arch.obs_dim(),
            });
        }

        self.run(&mut Eager, obs.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{arch::Activation, params::Tensor};

    fn tiny() -> (PolicyArch, PolicyParameters) {
        let arch = PolicyArch::ActorCritic {
            obs_dim: 2,
            act_dim: 1,
            features: Default::default(),
            shared: vec![],
            pi: vec![2],
            activation: Activation::Relu,
        };

        let params = PolicyParameters::new(vec![
            Tensor::new("mlp_extractor.policy_net.0.weight", vec![2, 2], vec![1., -1., 2., 0.5])
                .unwrap(),
            Tensor::new("mlp_extractor.policy_net.0.bias", vec![2], vec![0., 1.]).unwrap(),
            Tensor::new("action_net.weight", vec![1, 2], vec![3., 1.]).unwrap(),
            Tensor::new("action_net.bias", vec![1], vec![-0.5]).unwrap(),
        ]);

        (arch, params)
    }

    #[test]
    fn forward_matches_hand_computation() {
        let (arch, params) = tiny();
        let extractor = Extractor::new(arch, &params).unwrap();

        // hidden = relu([1 - 2, 2 + 1 + 1]) = [0, 4], action = 3*0 + 4 - 0.5
        let action = extractor.forward(&[1.0, 2.0]).unwrap();
        assert_eq!(action, vec![3.5]);
    }

    #[test]
    fn batch_rows_are_independent() {
        let (arch, params) = tiny();
        let extractor = Extractor::new(arch, &params).unwrap();

        let out = extractor
            .forward_batch(array![[1.0, 2.0], [0.0, 0.0]].view())
            .unwrap();
        assert_eq!(out, array![[3.5], [0.5]]);
    }

    #[test]
    fn rejects_wrong_observation_width() {
        let (arch, params) = tiny();
        let extractor = Extractor::new(arch, &params).unwrap();

        assert_eq!(
            extractor.forward(&[1.0, 2.0, 3.0]),
            Err(PolicyErr::Input {
                got: 3,
                expected: 2
            })
        );
    }

    #[test]
    fn snapshot_is_detached_from_training() {
        let (arch, mut params) = tiny();
        let extractor = Extractor::new(arch, &params).unwrap();

        params.tensors_mut()[3].data_mut()[0] = 100.0;
        assert_eq!(extractor.forward(&[1.0, 2.0]).unwrap(), vec![3.5]);
    }
}
