//! stats.rs
//! Sample statistics over one step's values.

/// Sorted copy of a sample list. Empty lists report NaN for every
/// statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStats {
    sorted: Vec<f64>,
}

impl SampleStats {
    pub fn new(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        self.sorted.iter().sum::<f64>() / self.sorted.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.sorted.first().copied().unwrap_or(f64::NAN)
    }

    pub fn max(&self) -> f64 {
        self.sorted.last().copied().unwrap_or(f64::NAN)
    }

    /// Quantile with linear interpolation between closest ranks.
    pub fn quantile(&self, p: f64) -> f64 {
        let n = self.sorted.len();
        if n == 0 {
            return f64::NAN;
        }
        let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
        let lo = h.floor() as usize;
        let hi = h.ceil() as usize;
        let (a, b) = (self.sorted[lo], self.sorted[hi.min(n - 1)]);
        if lo == hi {
            return a;
        }
        a + (h - lo as f64) * (b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(0.5, 3.0)]
    #[case(0.9, 4.6)]
    #[case(1.0, 5.0)]
    fn test_quantile_interpolates(#[case] p: f64, #[case] expected: f64) {
        let stats = SampleStats::new(&[5.0, 1.0, 4.0, 2.0, 3.0]);
        assert!((stats.quantile(p) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_basic_statistics() {
        let stats = SampleStats::new(&[2.0, -1.0, 8.0, 3.0]);
        assert_eq!(stats.mean(), 3.0);
        assert_eq!(stats.min(), -1.0);
        assert_eq!(stats.max(), 8.0);
        assert_eq!(SampleStats::new(&[7.0]).quantile(0.99), 7.0);
        assert!(SampleStats::new(&[]).mean().is_nan());
    }
}
