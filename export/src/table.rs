//! The static table backend: every tensor written out as a named C array of `float`
//! literals, ready to be compiled straight into a runtime that evaluates the policy with
//! plain loops.

use std::fmt::{self, Display};

use log::info;
use policy::{Block, Extractor, PolicyArch, PolicyParameters, element_count};

use crate::{ExportErr, Result};

const DECLARATION: &str = "static const float ";
const HIDDEN_DEFINE: &str = "#define HIDDEN_LAYER_SIZE";

/// Renders `v` so that parsing it back yields exactly `v`.
pub fn literal(v: f32) -> String {
    format!("{v:?}f")
}

/// The variable names the inference runtime declares for `arch`, in layout order.
pub fn runtime_names(arch: &PolicyArch) -> Vec<String> {
    arch.layers()
        .iter()
        .flat_map(|layer| {
            let n = layer.index + 1;
            match layer.block {
                Block::Shared => [format!("sharedWeights{n}"), format!("sharedBias{n}")],
                Block::Policy => [format!("policyWeights{n}"), format!("policyBias{n}")],
                Block::Action => ["actionWeights".to_string(), "actionBias".to_string()],
            }
        })
        .collect()
}

/// One named array of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableArray {
    name: String,
    dims: Vec<usize>,
    values: Vec<f32>,
}

impl TableArray {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn check_dims(&self, expected: &[usize]) -> Result<()> {
        if self.dims != expected {
            return Err(ExportErr::ShapeMismatch {
                name: self.name.clone(),
                got: self.dims.clone(),
                expected: expected.to_vec(),
            });
        }

        Ok(())
    }
}

/// The policy as an ordered list of named arrays, optionally preceded by the hidden layer
/// width the runtime is compiled with.
#[derive(Debug, Clone, PartialEq)]
pub struct TableArtifact {
    hidden_layer_size: Option<usize>,
    arrays: Vec<TableArray>,
}

impl TableArtifact {
    /// Builds the table from `params`, naming the tensors in order.
    ///
    /// # Arguments
    /// * `params` - The tensors to write, each of rank 1 or 2.
    /// * `names` - One variable name per tensor.
    /// * `hidden_layer_size` - The width to `#define`, if any.
    ///
    /// # Returns
    /// The table or an error if the names do not pair up with the tensors or a value is
    /// not finite.
    pub fn emit<S: AsRef<str>>(
        params: &PolicyParameters,
        names: &[S],
        hidden_layer_size: Option<usize>,
    ) -> Result<Self> {
        if names.len() != params.len() {
            return Err(ExportErr::NamingMismatch {
                names: names.len(),
                tensors: params.len(),
            });
        }

        let mut arrays = Vec::with_capacity(names.len());

        for (tensor, name) in params.tensors().iter().zip(names) {
            let name = name.as_ref().to_string();
            let dims = tensor.shape().to_vec();

            if !matches!(dims.len(), 1 | 2) || dims.contains(&0) {
                return Err(ExportErr::ShapeMismatch {
                    name,
                    got: dims,
                    expected: vec![],
                });
            }

            if let Some((index, &value)) =
                tensor.data().iter().enumerate().find(|(_, v)| !v.is_finite())
            {
                return Err(ExportErr::NonFinite { name, index, value });
            }

            arrays.push(TableArray {
                name,
                dims,
                values: tensor.data().to_vec(),
            });
        }

        Ok(Self {
            hidden_layer_size,
            arrays,
        })
    }

    /// Builds the table the inference runtime expects for `extractor`.
    pub fn from_extractor(extractor: &Extractor) -> Result<Self> {
        let arch = extractor.arch();
        let hidden = arch
            .layers()
            .first()
            .filter(|layer| layer.block != Block::Action)
            .map(|layer| layer.fan_out);

        let table = Self::emit(extractor.parameters(), &runtime_names(arch), hidden)?;
        info!(arrays = table.arrays.len(); "built static table");

        Ok(table)
    }

    pub fn hidden_layer_size(&self) -> Option<usize> {
        self.hidden_layer_size
    }

    pub fn arrays(&self) -> &[TableArray] {
        &self.arrays
    }

    pub fn get(&self, name: &str) -> Option<&TableArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Reads a table back from its text form.
    ///
    /// # Errors
    /// `ExportErr::Format` on anything that is not a declaration this backend writes.
    pub fn parse(text: &str) -> Result<Self> {
        let hidden_layer_size = text
            .lines()
            .find_map(|line| line.trim().strip_prefix(HIDDEN_DEFINE))
            .map(|n| {
                n.trim()
                    .parse()
                    .map_err(|_| ExportErr::Format(format!("bad hidden layer size {n:?}")))
            })
            .transpose()?;

        let arrays = text
            .split(DECLARATION)
            .skip(1)
            .map(parse_array)
            .collect::<Result<_>>()?;

        Ok(Self {
            hidden_layer_size,
            arrays,
        })
    }

    /// Evaluates the table the way the inference runtime does: for every layer
    /// `to[y] = act(sum_x W[y][x] * from[x] + b[y])`, arrays taken pairwise in order.
    ///
    /// # Arguments
    /// * `arch` - The architecture the table was written for.
    /// * `obs` - A single observation.
    ///
    /// # Returns
    /// The raw action or an error if the arrays do not fit `arch`.
    pub fn evaluate(&self, arch: &PolicyArch, obs: &[f32]) -> Result<Vec<f32>> {
        let layers = arch.layers();
        if self.arrays.len() != 2 * layers.len() {
            return Err(ExportErr::NamingMismatch {
                names: self.arrays.len(),
                tensors: 2 * layers.len(),
            });
        }

        if obs.len() != arch.obs_dim() {
            return Err(policy::PolicyErr::Input {
                got: obs.len(),
                expected: arch.obs_dim(),
            }
            .into());
        }

        let mut from = obs.to_vec();

        for (layer, pair) in layers.iter().zip(self.arrays.chunks_exact(2)) {
            let (weights, bias) = (&pair[0], &pair[1]);
            weights.check_dims(&layer.weight_shape())?;
            bias.check_dims(&layer.bias_shape())?;

            let mut to = vec![0.0; layer.fan_out];
            for (y, out) in to.iter_mut().enumerate() {
                let row = &weights.values[y * layer.fan_in..(y + 1) * layer.fan_in];
                let sum: f32 = row.iter().zip(&from).map(|(w, x)| w * x).sum();

                *out = sum + bias.values[y];
                if let Some(activation) = layer.activation {
                    *out = activation.f(*out);
                }
            }

            from = to;
        }

        Ok(from)
    }
}

fn parse_array(decl: &str) -> Result<TableArray> {
    let format_err = |msg: &str| ExportErr::Format(format!("{msg} in {:?}", head(decl)));

    let (signature, body) = decl
        .split_once('=')
        .ok_or_else(|| format_err("missing initializer"))?;
    let (name, dims) = signature
        .trim()
        .split_once('[')
        .ok_or_else(|| format_err("missing dimensions"))?;

    let dims = dims
        .split(['[', ']'])
        .filter(|d| !d.trim().is_empty())
        .map(|d| d.trim().parse())
        .collect::<std::result::Result<Vec<usize>, _>>()
        .map_err(|_| format_err("bad dimensions"))?;

    let (body, _) = body
        .split_once("};")
        .ok_or_else(|| format_err("unterminated initializer"))?;

    let values = body
        .split(|c: char| c == '{' || c == '}' || c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .strip_suffix('f')
                .unwrap_or(token)
                .parse::<f32>()
                .map_err(|_| format_err(&format!("bad literal {token:?}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let array = TableArray {
        name: name.trim().to_string(),
        dims,
        values,
    };

    if element_count(&array.dims) != Some(array.values.len()) {
        return Err(ExportErr::ShapeMismatch {
            name: array.name,
            got: vec![array.values.len()],
            expected: array.dims,
        });
    }

    Ok(array)
}

fn head(s: &str) -> &str {
    s.lines().next().unwrap_or_default().trim()
}

impl Display for TableArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#pragma once\n\n")?;
        if let Some(size) = self.hidden_layer_size {
            write!(f, "{HIDDEN_DEFINE} {size}\n\n")?;
        }

        for array in &self.arrays {
            match array.dims[..] {
                [rows, cols] => {
                    write!(f, "{DECLARATION}{}[{rows}][{cols}] =\n{{\n", array.name)?;
                    for row in array.values.chunks(cols) {
                        write!(f, "\t{{ ")?;
                        for &v in row {
                            write!(f, "{}, ", literal(v))?;
                        }
                        writeln!(f, "}},")?;
                    }
                    write!(f, "}};\n\n")?;
                }
                _ => {
                    write!(f, "{DECLARATION}{}[{}] =\n{{\n\t", array.name, array.values.len())?;
                    for &v in &array.values {
                        write!(f, "{}, ", literal(v))?;
                    }
                    write!(f, "\n}};\n\n")?;
                }
            }
        }

        Ok(())
    }
}
