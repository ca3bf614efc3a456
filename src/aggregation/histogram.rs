//! histogram.rs
//! Bucketing of step samples for histogram display.

use crate::store::HistogramBucket;

/// Sorts `values` into at most `max_buckets` equally wide buckets with
/// integer bounds. The bucket count is capped by the rounded-up range of
/// the data; a range of zero yields one bucket around the value. Infinite
/// values land in the first or last bucket, NaN is ignored.
pub fn generate_histogram(values: &[f64], max_buckets: usize) -> Vec<HistogramBucket> {
    let samples: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if samples.is_empty() {
        return Vec::new();
    }
    let finite = samples.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (min, max) = if min > max { (0.0, 0.0) } else { (min, max) };

    let low = min.floor();
    let high = max.ceil();
    if low == high {
        return vec![HistogramBucket { min: low - 1.0, max: high + 1.0, count: samples.len() }];
    }

    let bucket_count = (max_buckets as f64).min((max - min).ceil()).max(1.0);
    let width = ((high - low) / bucket_count).ceil();

    let mut buckets = Vec::new();
    let mut bucket_min = low;
    while bucket_min < high {
        buckets.push(HistogramBucket { min: bucket_min, max: bucket_min + width, count: 0 });
        bucket_min += width;
    }
    let last = buckets.len() - 1;
    for v in samples {
        // the top bound is inclusive for the last value only
        let idx = if v == f64::NEG_INFINITY { 0 } else { (((v - low) / width).floor() as usize).min(last) };
        buckets[idx].count += 1;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![1.0, 2.0, 3.0, 100.0], 10)]
    #[case(vec![0.2, 0.4, 1.7], 2)]
    #[case(vec![5.0, 5.0, 5.0], 1)]
    #[case(vec![-3.5, 2.0, 2.0, 6.1, 1.0], 10)]
    #[case(vec![1.0, 2.0, f64::INFINITY], 1)]
    #[case(vec![f64::NEG_INFINITY, 0.5, 3.0], 3)]
    fn test_counts_add_up(#[case] values: Vec<f64>, #[case] max_expected: usize) {
        let buckets = generate_histogram(&values, 10);
        let total: usize = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, values.len());
        assert!(buckets.len() <= max_expected);
    }

    #[test]
    fn test_bounds_are_floor_and_ceil() {
        let buckets = generate_histogram(&[0.0, 10.0, 4.5], 10);
        assert_eq!(buckets.first().map(|b| b.min), Some(0.0));
        assert_eq!(buckets.last().map(|b| b.max), Some(10.0));
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[4].count, 1);
        assert_eq!(buckets[9].count, 1);
    }

    #[rstest]
    #[case(vec![0.9, 1.1], vec![HistogramBucket { min: 0.0, max: 2.0, count: 2 }])]
    #[case(vec![0.5, 9.5, 4.0], vec![
        HistogramBucket { min: 0.0, max: 2.0, count: 1 },
        HistogramBucket { min: 2.0, max: 4.0, count: 0 },
        HistogramBucket { min: 4.0, max: 6.0, count: 1 },
        HistogramBucket { min: 6.0, max: 8.0, count: 0 },
        HistogramBucket { min: 8.0, max: 10.0, count: 1 },
    ])]
    #[case(vec![1.5, 1.5], vec![HistogramBucket { min: 1.0, max: 2.0, count: 2 }])]
    fn test_narrow_range_is_not_over_bucketed(#[case] values: Vec<f64>, #[case] expected: Vec<HistogramBucket>) {
        assert_eq!(generate_histogram(&values, 10), expected);
    }

    #[test]
    fn test_infinite_values_are_counted_in_outer_buckets() {
        let buckets = generate_histogram(&[1.0, 2.0, f64::INFINITY], 10);
        assert_eq!(buckets, vec![HistogramBucket { min: 1.0, max: 2.0, count: 3 }]);
        let buckets = generate_histogram(&[f64::NEG_INFINITY, f64::INFINITY], 10);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_single_value_bucket() {
        let buckets = generate_histogram(&[3.0], 10);
        assert_eq!(buckets, vec![HistogramBucket { min: 2.0, max: 4.0, count: 1 }]);
        assert!(generate_histogram(&[], 10).is_empty());
    }

    #[test]
    fn test_bucket_limit_is_configurable() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_eq!(generate_histogram(&values, 4).len(), 4);
    }
}
