use ndarray::{linalg, prelude::*};

use crate::{
    PolicyErr, Result,
    arch::{Activation, FeatureExtractor},
    params::Tensor,
};

/// The primitive operations the deterministic policy path is made of.
///
/// The forward definition in `Extractor::run` is written once against this trait, so the
/// same sequence of operations can be evaluated eagerly or recorded into a graph.
pub trait PolicyOps {
    /// What flows between operations: actual numbers or symbolic graph values.
    type Value;

    /// Turns the raw observation into the trunk's input features.
    fn features(&mut self, x: Self::Value, extractor: FeatureExtractor) -> Result<Self::Value>;

    /// Applies `x * weightᵀ + bias`, with `weight` laid out as `(out, in)`.
    fn linear(&mut self, x: Self::Value, weight: &Tensor, bias: &Tensor) -> Result<Self::Value>;

    /// Applies `activation` element wise.
    fn activation(&mut self, x: Self::Value, activation: Activation) -> Result<Self::Value>;
}

/// Evaluates the operations right away on a batch of rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct Eager;

impl PolicyOps for Eager {
    type Value = Array2<f32>;

    fn features(&mut self, x: Array2<f32>, extractor: FeatureExtractor) -> Result<Array2<f32>> {
        match extractor {
            FeatureExtractor::Flatten => Ok(x),
        }
    }

    fn linear(&mut self, x: Array2<f32>, weight: &Tensor, bias: &Tensor) -> Result<Array2<f32>> {
        let w = weight.matrix()?;
        let b = bias.vector()?;

        if x.ncols() != w.ncols() {
            return Err(PolicyErr::ShapeMismatch {
                name: weight.name().to_string(),
                got: weight.shape().to_vec(),
                expected: vec![w.nrows(), x.ncols()],
            });
        }

        let mut z = Array2::zeros((x.nrows(), w.nrows()));
        linalg::general_mat_mul(1.0, &x, &w.t(), 0.0, &mut z);
        z += &b;

        Ok(z)
    }

    fn activation(&mut self, mut x: Array2<f32>, activation: Activation) -> Result<Array2<f32>> {
        x.mapv_inplace(|v| activation.f(v));
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_uses_out_in_layout() {
        let w = Tensor::new("w", vec![2, 3], vec![1., 0., 0., 0., 1., 1.]).unwrap();
        let b = Tensor::new("b", vec![2], vec![0.5, -1.0]).unwrap();
        let x = array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]];

        let z = Eager.linear(x, &w, &b).unwrap();
        assert_eq!(z, array![[1.5, 4.0], [0.5, -1.0]]);
    }

    #[test]
    fn linear_checks_the_input_width() {
        let w = Tensor::new("w", vec![2, 3], vec![0.0; 6]).unwrap();
        let b = Tensor::new("b", vec![2], vec![0.0; 2]).unwrap();

        assert!(Eager.linear(Array2::zeros((1, 4)), &w, &b).is_err());
    }
}
