use rand::Rng;
use rand_distr::{Exp1, StandardNormal};
use sim::RangeSpec;

/// A box shaped space: one closed interval per dimension, possibly infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "low and high must have the same length");
        Self { low, high }
    }

    pub fn low(&self) -> &[f32] {
        &self.low
    }

    pub fn high(&self) -> &[f32] {
        &self.high
    }

    /// The amount of dimensions of the space.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn contains(&self, x: &[f32]) -> bool {
        x.len() == self.dim()
            && x.iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    /// Draws a point of the space.
    ///
    /// Dimensions bounded on both sides are sampled uniformly, half-bounded ones follow a
    /// shifted exponential and unbounded ones a standard normal.
    ///
    /// # Arguments
    /// * `rng` - The random number generator.
    ///
    /// # Returns
    /// A vector of `dim` components inside the space.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&lo, &hi)| match (lo.is_finite(), hi.is_finite()) {
                (true, true) if lo == hi => lo,
                (true, true) => rng.random_range(lo..=hi),
                (true, false) => lo + rng.sample::<f32, _>(Exp1),
                (false, true) => hi - rng.sample::<f32, _>(Exp1),
                (false, false) => rng.sample(StandardNormal),
            })
            .collect()
    }
}

impl From<&RangeSpec> for BoxSpace {
    fn from(range: &RangeSpec) -> Self {
        Self::new(range.min().to_vec(), range.max().to_vec())
    }
}
