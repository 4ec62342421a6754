//! Policy checkpoints in the safetensors format.
//!
//! safetensors keeps tensors keyed by name with no order of their own, so the parameter
//! order and the architecture travel in the file's metadata.

use std::{collections::HashMap, fs, path::Path};

use log::info;
use policy::{FORMAT_VERSION, PolicyArch, PolicyParameters, Tensor};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{OrchestratorError, Result, write_atomic};

const ORDER_KEY: &str = "order";
const ARCH_KEY: &str = "arch";
const VERSION_KEY: &str = "format_version";

fn checkpoint_err(msg: impl Into<String>) -> OrchestratorError {
    OrchestratorError::Checkpoint(msg.into())
}

/// Encodes `params` and the architecture they belong to.
pub fn encode_checkpoint(arch: &PolicyArch, params: &PolicyParameters) -> Result<Vec<u8>> {
    let order: Vec<&str> = params.names().collect();

    let metadata = HashMap::from([
        (
            ORDER_KEY.to_string(),
            serde_json::to_string(&order).map_err(|e| checkpoint_err(e.to_string()))?,
        ),
        (
            ARCH_KEY.to_string(),
            serde_json::to_string(arch).map_err(|e| checkpoint_err(e.to_string()))?,
        ),
        (VERSION_KEY.to_string(), params.version().to_string()),
    ]);

    let views = params
        .tensors()
        .iter()
        .map(|t| -> Result<_> {
            let data = bytemuck::cast_slice(t.data());
            let view = TensorView::new(Dtype::F32, t.shape().to_vec(), data)?;
            Ok((t.name(), view))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(safetensors::serialize(views, &Some(metadata))?)
}

/// Decodes a checkpoint written by `encode_checkpoint`.
///
/// # Returns
/// The architecture and the parameters in their original order.
pub fn decode_checkpoint(bytes: &[u8]) -> Result<(PolicyArch, PolicyParameters)> {
    let (_, header) = SafeTensors::read_metadata(bytes)?;
    let metadata = header
        .metadata()
        .as_ref()
        .ok_or_else(|| checkpoint_err("the checkpoint has no metadata"))?;

    let field = |key: &str| {
        metadata
            .get(key)
            .ok_or_else(|| checkpoint_err(format!("the checkpoint metadata lacks {key:?}")))
    };

    let version: u32 = field(VERSION_KEY)?
        .parse()
        .map_err(|_| checkpoint_err("unreadable format version"))?;
    if version != FORMAT_VERSION {
        return Err(checkpoint_err(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }

    let order: Vec<String> =
        serde_json::from_str(field(ORDER_KEY)?).map_err(|e| checkpoint_err(e.to_string()))?;
    let arch: PolicyArch =
        serde_json::from_str(field(ARCH_KEY)?).map_err(|e| checkpoint_err(e.to_string()))?;

    let tensors = SafeTensors::deserialize(bytes)?;
    let params = order
        .into_iter()
        .map(|name| -> Result<Tensor> {
            let view = tensors.tensor(&name)?;
            if view.dtype() != Dtype::F32 {
                return Err(checkpoint_err(format!(
                    "tensor {name} is {:?}, only F32 is supported",
                    view.dtype()
                )));
            }

            let data = bytemuck::pod_collect_to_vec::<u8, f32>(view.data());
            Ok(Tensor::new(name, view.shape().to_vec(), data)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((arch, PolicyParameters::new(params)))
}

/// Atomically writes a checkpoint to `path`.
pub fn save_checkpoint<P: AsRef<Path>>(
    path: P,
    arch: &PolicyArch,
    params: &PolicyParameters,
) -> Result<()> {
    let path = path.as_ref();
    write_atomic(path, &encode_checkpoint(arch, params)?)?;
    info!(path:? = path, tensors = params.len(); "saved checkpoint");
    Ok(())
}

/// Reads a checkpoint from `path`.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<(PolicyArch, PolicyParameters)> {
    decode_checkpoint(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_values_and_arch() {
        let arch = PolicyArch::locomotion(6, 2);
        let params = PolicyParameters::init(&arch, 4).unwrap();

        let bytes = encode_checkpoint(&arch, &params).unwrap();
        let (decoded_arch, decoded) = decode_checkpoint(&bytes).unwrap();

        assert_eq!(decoded_arch, arch);
        assert_eq!(decoded, params);
    }

    #[test]
    fn foreign_tensors_survive() {
        let arch = PolicyArch::locomotion(2, 1);
        let mut tensors = vec![Tensor::new("log_std", vec![1], vec![-0.5]).unwrap()];
        tensors.extend(PolicyParameters::init(&arch, 0).unwrap().tensors().iter().cloned());
        let params = PolicyParameters::new(tensors);

        let (_, decoded) = decode_checkpoint(&encode_checkpoint(&arch, &params).unwrap()).unwrap();
        assert_eq!(decoded.names().next(), Some("log_std"));
        assert_eq!(decoded, params);
    }

    #[test]
    fn garbage_is_a_checkpoint_error() {
        assert!(matches!(
            decode_checkpoint(b"definitely not safetensors"),
            Err(OrchestratorError::Checkpoint(_))
        ));
    }
}
