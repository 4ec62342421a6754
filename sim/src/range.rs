use crate::error::{AdapterInitError, InitResult};

/// Any reported bound whose magnitude reaches this value means "no bound".
///
/// A genuine bound this large cannot be told apart from the sentinel, the native
/// module must never report one.
pub const UNBOUNDED_SENTINEL: f32 = 9999.0;

/// Translates a lower bound reported by the native module.
pub fn translate_min(min: f32) -> f32 {
    if min.abs() >= UNBOUNDED_SENTINEL {
        f32::NEG_INFINITY
    } else {
        min
    }
}

/// Translates an upper bound reported by the native module.
pub fn translate_max(max: f32) -> f32 {
    if max.abs() >= UNBOUNDED_SENTINEL {
        f32::INFINITY
    } else {
        max
    }
}

/// Per-dimension `(min, max)` bounds of a state or action vector, with unbounded
/// dimensions already expressed as infinities.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    min: Vec<f32>,
    max: Vec<f32>,
}

impl RangeSpec {
    /// Builds a `RangeSpec` from the raw buffers filled by the native module.
    ///
    /// # Arguments
    /// * `what` - Which vector the range belongs to, used for error reporting.
    /// * `min` - The raw lower bounds.
    /// * `max` - The raw upper bounds, same length as `min`.
    ///
    /// # Returns
    /// The translated range or an error if some dimension is not a valid interval.
    pub fn from_native(what: &'static str, min: &[f32], max: &[f32]) -> InitResult<Self> {
        debug_assert_eq!(min.len(), max.len());

        let min: Vec<f32> = min.iter().copied().map(translate_min).collect();
        let max: Vec<f32> = max.iter().copied().map(translate_max).collect();

        for (index, (&lo, &hi)) in min.iter().zip(&max).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(AdapterInitError::InvalidRange {
                    what,
                    index,
                    min: lo,
                    max: hi,
                });
            }
        }

        Ok(Self { min, max })
    }

    /// A range of `len` dimensions without any bound.
    pub fn unbounded(len: usize) -> Self {
        Self {
            min: vec![f32::NEG_INFINITY; len],
            max: vec![f32::INFINITY; len],
        }
    }

    /// A range of `len` dimensions bounded by `[-bound, bound]`.
    pub fn symmetric(len: usize, bound: f32) -> Self {
        let bound = bound.abs();
        Self {
            min: vec![-bound; len],
            max: vec![bound; len],
        }
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    pub fn min(&self) -> &[f32] {
        &self.min
    }

    pub fn max(&self) -> &[f32] {
        &self.max
    }

    /// Returns the `(min, max)` pair of dimension `i`.
    pub fn bounds(&self, i: usize) -> (f32, f32) {
        (self.min[i], self.max[i])
    }

    /// Whether `values` has one component per dimension and all of them lie in range.
    pub fn contains(&self, values: &[f32]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_maps_to_unbounded() {
        let range = RangeSpec::from_native("state", &[-9999.0], &[9999.0]).unwrap();
        assert_eq!(range.bounds(0), (f32::NEG_INFINITY, f32::INFINITY));
    }

    #[test]
    fn just_below_sentinel_is_kept() {
        let range = RangeSpec::from_native("state", &[-9998.9], &[9998.9]).unwrap();
        assert_eq!(range.bounds(0), (-9998.9, 9998.9));
    }

    #[test]
    fn float_max_reports_are_unbounded() {
        let range = RangeSpec::from_native("state", &[-f32::MAX], &[f32::INFINITY]).unwrap();
        assert_eq!(range.bounds(0), (f32::NEG_INFINITY, f32::INFINITY));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = RangeSpec::from_native("action", &[0.0, 1.0], &[1.0, 0.5]).unwrap_err();
        assert!(matches!(
            err,
            AdapterInitError::InvalidRange {
                what: "action",
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn nan_bound_is_rejected() {
        assert!(RangeSpec::from_native("action", &[f32::NAN], &[1.0]).is_err());
    }

    #[test]
    fn contains_checks_length_and_bounds() {
        let range = RangeSpec::symmetric(2, 1.0);
        assert!(range.contains(&[0.5, -1.0]));
        assert!(!range.contains(&[0.5, -1.5]));
        assert!(!range.contains(&[0.5]));
        assert!(RangeSpec::unbounded(1).contains(&[1e30]));
    }
}
