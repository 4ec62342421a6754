//! The graph trace backend: the forward pass recorded once into a self-contained graph of
//! operations and constants, stored in a small versioned binary container.
//!
//! Layout of a serialized artifact:
//!
//! | bytes | content |
//! |---|---|
//! | 8 | magic `LOCOGRAF` |
//! | 4 | format version, big endian `u32` |
//! | 8 | header length, big endian `u64` |
//! | n | JSON header: input shape, output width, nodes, constant names and shapes |
//! | .. | constant data, little endian `f32`, constants in header order |

use log::info;
use ndarray::Array2;
use policy::{
    Activation, Eager, Extractor, FeatureExtractor, PolicyErr, PolicyOps, Tensor, element_count,
};
use serde::{Deserialize, Serialize};

use crate::{ExportErr, Result, parity};

pub const GRAPH_MAGIC: &[u8; 8] = b"LOCOGRAF";
pub const GRAPH_VERSION: u32 = 1;

type VersionField = u32;
type LengthField = u64;
const PREAMBLE_SIZE: usize =
    GRAPH_MAGIC.len() + size_of::<VersionField>() + size_of::<LengthField>();
const F32_SIZE: usize = size_of::<f32>();

/// One recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
    Flatten,
    /// Indices into the artifact's constants.
    Linear {
        weight: usize,
        bias: usize,
    },
    Activation {
        kind: Activation,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ConstantSpec {
    name: String,
    shape: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphHeader {
    input_shape: Vec<usize>,
    output_dim: usize,
    nodes: Vec<Node>,
    constants: Vec<ConstantSpec>,
}

/// The symbolic value flowing through a trace: only its width is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traced {
    width: usize,
}

/// A `PolicyOps` backend that records operations instead of computing them.
#[derive(Debug, Default)]
struct Tracer {
    nodes: Vec<Node>,
    constants: Vec<Tensor>,
}

impl Tracer {
    fn constant(&mut self, tensor: &Tensor) -> usize {
        self.constants.push(tensor.clone());
        self.constants.len() - 1
    }
}

impl PolicyOps for Tracer {
    type Value = Traced;

    fn features(&mut self, x: Traced, extractor: FeatureExtractor) -> policy::Result<Traced> {
        match extractor {
            FeatureExtractor::Flatten => self.nodes.push(Node::Flatten),
        }

        Ok(x)
    }

    fn linear(&mut self, x: Traced, weight: &Tensor, bias: &Tensor) -> policy::Result<Traced> {
        let w = weight.matrix()?;
        if w.ncols() != x.width {
            return Err(PolicyErr::ShapeMismatch {
                name: weight.name().to_string(),
                got: weight.shape().to_vec(),
                expected: vec![w.nrows(), x.width],
            });
        }

        let width = w.nrows();
        let weight = self.constant(weight);
        let bias = self.constant(bias);
        self.nodes.push(Node::Linear { weight, bias });

        Ok(Traced { width })
    }

    fn activation(&mut self, x: Traced, kind: Activation) -> policy::Result<Traced> {
        self.nodes.push(Node::Activation { kind });
        Ok(x)
    }
}

/// A traced policy: the operations the forward pass actually executed and the constants
/// they read, independent of the code that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphArtifact {
    input_shape: Vec<usize>,
    output_dim: usize,
    nodes: Vec<Node>,
    constants: Vec<Tensor>,
}

impl GraphArtifact {
    /// Traces `extractor` on `example` and checks that the result, both as built and after a
    /// trip through its binary form, reproduces the extractor on that same example.
    ///
    /// # Arguments
    /// * `extractor` - The policy to trace.
    /// * `example` - A representative observation.
    ///
    /// # Returns
    /// The verified artifact or an error if tracing fails or the artifact diverges.
    pub fn trace(extractor: &Extractor, example: &[f32]) -> Result<Self> {
        let expected = extractor.forward(example)?;

        let mut tracer = Tracer::default();
        let output = extractor.run(
            &mut tracer,
            Traced {
                width: example.len(),
            },
        )?;

        let artifact = Self {
            input_shape: vec![1, example.len()],
            output_dim: output.width,
            nodes: tracer.nodes,
            constants: tracer.constants,
        };

        parity::check("graph", &expected, &artifact.evaluate(example)?)?;

        let reloaded = Self::from_bytes(&artifact.to_bytes()?)?;
        parity::check("graph", &expected, &reloaded.evaluate(example)?)?;

        info!(
            nodes = artifact.nodes.len(),
            constants = artifact.constants.len();
            "traced policy graph"
        );

        Ok(artifact)
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn constants(&self) -> &[Tensor] {
        &self.constants
    }

    fn input_dim(&self) -> usize {
        self.input_shape.last().copied().unwrap_or_default()
    }

    /// Runs the recorded graph on a single observation.
    pub fn evaluate(&self, obs: &[f32]) -> Result<Vec<f32>> {
        if obs.len() != self.input_dim() {
            return Err(PolicyErr::Input {
                got: obs.len(),
                expected: self.input_dim(),
            }
            .into());
        }

        let mut x = Array2::from_shape_vec((1, obs.len()), obs.to_vec())
            .map_err(|e| ExportErr::Format(e.to_string()))?;

        for node in &self.nodes {
            x = match *node {
                Node::Flatten => Eager.features(x, FeatureExtractor::Flatten)?,
                Node::Linear { weight, bias } => {
                    Eager.linear(x, self.constant(weight)?, self.constant(bias)?)?
                }
                Node::Activation { kind } => Eager.activation(x, kind)?,
            };
        }

        Ok(x.iter().copied().collect())
    }

    fn constant(&self, index: usize) -> Result<&Tensor> {
        self.constants.get(index).ok_or_else(|| {
            ExportErr::Format(format!(
                "node refers to constant {index} but there are {}",
                self.constants.len()
            ))
        })
    }

    /// Encodes the artifact into its binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = GraphHeader {
            input_shape: self.input_shape.clone(),
            output_dim: self.output_dim,
            nodes: self.nodes.clone(),
            constants: self
                .constants
                .iter()
                .map(|t| ConstantSpec {
                    name: t.name().to_string(),
                    shape: t.shape().to_vec(),
                })
                .collect(),
        };
        let header = serde_json::to_vec(&header)?;

        let data_len: usize = self.constants.iter().map(|t| t.data().len()).sum();
        let mut buf = Vec::with_capacity(PREAMBLE_SIZE + header.len() + data_len * F32_SIZE);

        buf.extend_from_slice(GRAPH_MAGIC);
        buf.extend_from_slice(&GRAPH_VERSION.to_be_bytes());
        buf.extend_from_slice(&(header.len() as LengthField).to_be_bytes());
        buf.extend_from_slice(&header);

        for v in self.constants.iter().flat_map(|t| t.data()) {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        Ok(buf)
    }

    /// Decodes an artifact from its binary form.
    ///
    /// # Errors
    /// `ExportErr::Format` if the magic, version, header or data length are off.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREAMBLE_SIZE {
            return Err(ExportErr::Format(format!(
                "got {} bytes, a graph artifact has at least {PREAMBLE_SIZE}",
                bytes.len()
            )));
        }

        let (magic, rest) = bytes.split_at(GRAPH_MAGIC.len());
        if magic != GRAPH_MAGIC {
            return Err(ExportErr::Format("not a graph artifact".into()));
        }

        let (version, rest) = rest.split_at(size_of::<VersionField>());
        let version = VersionField::from_be_bytes(bytemuck::pod_read_unaligned(version));
        if version != GRAPH_VERSION {
            return Err(ExportErr::Format(format!(
                "unsupported graph version {version}, expected {GRAPH_VERSION}"
            )));
        }

        let (header_len, rest) = rest.split_at(size_of::<LengthField>());
        let header_len = LengthField::from_be_bytes(bytemuck::pod_read_unaligned(header_len));
        let header_len = usize::try_from(header_len)
            .ok()
            .filter(|&len| len <= rest.len())
            .ok_or_else(|| ExportErr::Format(format!("header length {header_len} is too large")))?;

        let (header, data) = rest.split_at(header_len);
        let header: GraphHeader = serde_json::from_slice(header)?;

        let lens = header
            .constants
            .iter()
            .map(|c| {
                element_count(&c.shape).ok_or_else(|| {
                    ExportErr::Format(format!("constant {} has an oversized shape", c.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let expected = lens
            .iter()
            .try_fold(0usize, |acc, &len| acc.checked_add(len))
            .and_then(|n| n.checked_mul(F32_SIZE))
            .ok_or_else(|| ExportErr::Format("the constants do not fit in memory".to_string()))?;
        if data.len() != expected {
            return Err(ExportErr::Format(format!(
                "expected {expected} bytes of constants but got {}",
                data.len()
            )));
        }

        let mut values = data
            .chunks_exact(F32_SIZE)
            .map(|c| f32::from_le_bytes(bytemuck::pod_read_unaligned(c)));

        let constants = header
            .constants
            .into_iter()
            .zip(lens)
            .map(|(spec, len)| {
                let data = values.by_ref().take(len).collect();
                Tensor::new(spec.name, spec.shape, data)
            })
            .collect::<policy::Result<_>>()?;

        Ok(Self {
            input_shape: header.input_shape,
            output_dim: header.output_dim,
            nodes: header.nodes,
            constants,
        })
    }
}
