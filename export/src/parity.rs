use log::debug;
use policy::Extractor;

use crate::{ExportErr, GraphArtifact, Result, TableArtifact};

/// The largest absolute difference an artifact may show against the direct evaluation.
pub const TOLERANCE: f32 = 1e-5;

/// The largest absolute component-wise difference, infinite when the lengths differ or a
/// component is NaN.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter().zip(b).fold(0.0, |max, (x, y)| {
        let diff = (x - y).abs();
        if diff.is_nan() { f32::INFINITY } else { max.max(diff) }
    })
}

pub(crate) fn check(backend: &'static str, expected: &[f32], got: &[f32]) -> Result<()> {
    let max_diff = max_abs_diff(expected, got);
    debug!(backend = backend, max_diff = max_diff; "parity check");

    if max_diff > TOLERANCE {
        return Err(ExportErr::TraceMismatch {
            backend,
            max_diff,
            tolerance: TOLERANCE,
        });
    }

    Ok(())
}

/// Checks that both artifacts reproduce `extractor` on `obs`.
///
/// # Arguments
/// * `extractor` - The policy the artifacts were built from.
/// * `graph` - The graph trace artifact.
/// * `table` - The static table artifact.
/// * `obs` - The observation to compare on.
///
/// # Returns
/// An error naming the first artifact that diverges by more than `TOLERANCE`.
pub fn verify_parity(
    extractor: &Extractor,
    graph: &GraphArtifact,
    table: &TableArtifact,
    obs: &[f32],
) -> Result<()> {
    let expected = extractor.forward(obs)?;

    check("graph", &expected, &graph.evaluate(obs)?)?;
    check("table", &expected, &table.evaluate(extractor.arch(), obs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_of_equal_slices_is_zero() {
        assert_eq!(max_abs_diff(&[1.0, -2.0], &[1.0, -2.0]), 0.0);
    }

    #[test]
    fn nan_and_length_mismatch_never_pass() {
        assert_eq!(max_abs_diff(&[1.0], &[f32::NAN]), f32::INFINITY);
        assert_eq!(max_abs_diff(&[1.0], &[1.0, 2.0]), f32::INFINITY);
        assert!(check("graph", &[0.0], &[2e-5]).is_err());
        assert!(check("graph", &[0.0], &[5e-6]).is_ok());
    }
}
