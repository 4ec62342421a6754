use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{PolicyErr, Result, arch::{Block, PolicyArch}};

/// Version of the tensor naming and ordering convention.
pub const FORMAT_VERSION: u32 = 1;

/// Action head weights start this close to zero so early actions stay near the origin.
const ACTION_INIT_RANGE: f32 = 0.01;

/// A named, densely packed, row-major `f32` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// The amount of elements a tensor of `shape` holds, `None` if it does not fit in a `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
    /// Creates a new `Tensor`.
    ///
    /// # Arguments
    /// * `name` - The tensor's name.
    /// * `shape` - Its dimensions.
    /// * `data` - The row-major values, as many as the product of `shape`.
    ///
    /// # Returns
    /// The tensor or an error if `data` does not fill `shape`.
    pub fn new<S: Into<String>>(name: S, shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let name = name.into();

        if element_count(&shape) != Some(data.len()) {
            return Err(PolicyErr::ShapeMismatch {
                name,
                got: vec![data.len()],
                expected: shape,
            });
        }

        Ok(Self { name, shape, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Views a 2-D tensor as a matrix.
    pub fn matrix(&self) -> Result<ArrayView2<'_, f32>> {
        let [rows, cols] = self.shape[..] else {
            return Err(self.rank_mismatch(2));
        };

        ArrayView2::from_shape((rows, cols), &self.data).map_err(|_| self.rank_mismatch(2))
    }

    /// Views a 1-D tensor as a vector.
    pub fn vector(&self) -> Result<ArrayView1<'_, f32>> {
        let [len] = self.shape[..] else {
            return Err(self.rank_mismatch(1));
        };

        ArrayView1::from_shape(len, &self.data).map_err(|_| self.rank_mismatch(1))
    }

    fn rank_mismatch(&self, rank: usize) -> PolicyErr {
        PolicyErr::ShapeMismatch {
            name: self.name.clone(),
            got: self.shape.clone(),
            expected: vec![0; rank],
        }
    }
}

/// The ordered collection of named tensors a trained policy is made of.
///
/// The order is part of the contract: training emits the tensors in a fixed, versioned
/// order and every consumer walks them in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyParameters {
    version: u32,
    tensors: Vec<Tensor>,
}

impl PolicyParameters {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        Self {
            version: FORMAT_VERSION,
            tensors,
        }
    }

    /// Randomly initializes the tensors of `arch`: Xavier uniform weights, zero biases and a
    /// near zero action head.
    ///
    /// # Arguments
    /// * `arch` - The architecture to initialize.
    /// * `seed` - The random seed.
    ///
    /// # Returns
    /// The parameters in layout order or an error if the architecture is invalid.
    pub fn init(arch: &PolicyArch, seed: u64) -> Result<Self> {
        arch.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut tensors = Vec::new();

        for layer in arch.layers() {
            let range = match layer.block {
                Block::Action => ACTION_INIT_RANGE,
                _ => (6.0 / (layer.fan_in + layer.fan_out) as f32).sqrt(),
            };

            let weights = (0..layer.fan_in * layer.fan_out)
                .map(|_| rng.random_range(-range..range))
                .collect();

            tensors.push(Tensor::new(layer.weight_name(), layer.weight_shape(), weights)?);
            tensors.push(Tensor::new(
                layer.bias_name(),
                layer.bias_shape(),
                vec![0.0; layer.fan_out],
            )?);
        }

        Ok(Self::new(tensors))
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut [Tensor] {
        &mut self.tensors
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.iter().map(Tensor::name)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Checks that these parameters are exactly the layout of `arch`: same count, same
    /// names in the same order and the same shapes.
    pub fn validate(&self, arch: &PolicyArch) -> Result<()> {
        arch.validate()?;

        let layout = arch.parameter_layout();
        if layout.len() != self.tensors.len() {
            return Err(PolicyErr::BadArch(format!(
                "expected {} tensors but got {}",
                layout.len(),
                self.tensors.len()
            )));
        }

        for (tensor, (name, shape)) in self.tensors.iter().zip(layout) {
            if tensor.name != name || tensor.shape != shape {
                return Err(PolicyErr::ShapeMismatch {
                    name: tensor.name.clone(),
                    got: tensor.shape.clone(),
                    expected: shape,
                });
            }
        }

        self.check_chain()
    }

    /// Picks the tensors the deterministic path of `arch` reads, in layout order, leaving
    /// out everything else (critic, log std, ...).
    ///
    /// # Returns
    /// The selected parameters or an error if a tensor is missing or misshapen.
    pub fn select(&self, arch: &PolicyArch) -> Result<Self> {
        arch.validate()?;

        let tensors = arch
            .parameter_layout()
            .into_iter()
            .map(|(name, shape)| {
                let tensor = self
                    .get(&name)
                    .ok_or_else(|| PolicyErr::MissingTensor { name: name.clone() })?;

                if tensor.shape != shape {
                    return Err(PolicyErr::ShapeMismatch {
                        name,
                        got: tensor.shape.clone(),
                        expected: shape,
                    });
                }

                Ok(tensor.clone())
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            version: self.version,
            tensors,
        })
    }

    /// Checks that the tensors form a chain of `(out, in)` weight / `(out,)` bias pairs where
    /// each layer's output width feeds the next layer's input width.
    pub fn check_chain(&self) -> Result<()> {
        let mut prev_out: Option<usize> = None;

        for pair in self.tensors.chunks(2) {
            let [weight, bias] = pair else {
                let last = &pair[0];
                return Err(PolicyErr::ShapeMismatch {
                    name: last.name.clone(),
                    got: last.shape.clone(),
                    expected: vec![],
                });
            };

            let [out, fan_in] = weight.shape[..] else {
                return Err(weight.rank_mismatch(2));
            };

            if prev_out.is_some_and(|prev| prev != fan_in) {
                return Err(PolicyErr::ShapeMismatch {
                    name: weight.name.clone(),
                    got: weight.shape.clone(),
                    expected: vec![out, prev_out.unwrap_or_default()],
                });
            }

            if bias.shape != [out] {
                return Err(PolicyErr::ShapeMismatch {
                    name: bias.name.clone(),
                    got: bias.shape.clone(),
                    expected: vec![out],
                });
            }

            prev_out = Some(out);
        }

        Ok(())
    }
}
