//! Score aggregation strategies.
//!
//! Collapses a non-empty list of per-illustration scores (already mapped to
//! [0, 1]) into one artist score. All strategies are pure functions; the
//! caller filters out artists with no embeddings before aggregating.

use atelier_core::models::AggregationStrategy;

/// Aggregate per-illustration scores under the given strategy.
///
/// `top_k` only affects `TopKMean`. Empty input is a caller bug
/// (`debug_assert`), handled as 0.0 in release builds.
pub fn aggregate(strategy: AggregationStrategy, scores: &[f32], top_k: usize) -> f32 {
    debug_assert!(!scores.is_empty(), "aggregation over an empty score list");
    if scores.is_empty() {
        return 0.0;
    }

    match strategy {
        AggregationStrategy::Max => scores.iter().copied().fold(f32::MIN, f32::max),
        AggregationStrategy::Mean => scores.iter().sum::<f32>() / scores.len() as f32,
        AggregationStrategy::WeightedMean => {
            let sum: f32 = scores.iter().sum();
            if sum > 0.0 {
                scores.iter().map(|s| s * s).sum::<f32>() / sum
            } else {
                0.0
            }
        }
        AggregationStrategy::TopKMean => {
            let k = top_k.max(1).min(scores.len());
            let mut sorted = scores.to_vec();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            sorted[..k].iter().sum::<f32>() / k as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCORES: [f32; 4] = [0.9, 0.8, 0.7, 0.1];

    #[test]
    fn max_picks_largest() {
        assert!((aggregate(AggregationStrategy::Max, &SCORES, 3) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn mean_averages_all() {
        assert!((aggregate(AggregationStrategy::Mean, &SCORES, 3) - 0.625).abs() < 1e-6);
    }

    #[test]
    fn top_k_mean_averages_largest_k() {
        assert!((aggregate(AggregationStrategy::TopKMean, &SCORES, 3) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn weighted_mean_weights_by_score() {
        // (0.81 + 0.64 + 0.49 + 0.01) / (0.9 + 0.8 + 0.7 + 0.1) = 1.95 / 2.5
        let got = aggregate(AggregationStrategy::WeightedMean, &SCORES, 3);
        assert!((got - 0.78).abs() < 1e-5, "got {got}");
    }

    #[test]
    fn weighted_mean_of_zeros_is_zero() {
        assert_eq!(aggregate(AggregationStrategy::WeightedMean, &[0.0, 0.0], 3), 0.0);
    }

    #[test]
    fn top_k_larger_than_list_uses_whole_list() {
        let got = aggregate(AggregationStrategy::TopKMean, &[0.4, 0.6], 20);
        assert!((got - 0.5).abs() < 1e-6);
    }

    #[test]
    fn all_strategies_agree_on_singletons() {
        for strategy in [
            AggregationStrategy::Max,
            AggregationStrategy::Mean,
            AggregationStrategy::WeightedMean,
            AggregationStrategy::TopKMean,
        ] {
            assert!((aggregate(strategy, &[0.42], 3) - 0.42).abs() < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn max_dominates_mean(scores in prop::collection::vec(0.0f32..=1.0, 1..32)) {
            let max = aggregate(AggregationStrategy::Max, &scores, 3);
            let mean = aggregate(AggregationStrategy::Mean, &scores, 3);
            prop_assert!(max >= mean - 1e-6);
        }

        #[test]
        fn results_stay_in_unit_interval(
            scores in prop::collection::vec(0.0f32..=1.0, 1..32),
            k in 1usize..=20,
        ) {
            for strategy in [
                AggregationStrategy::Max,
                AggregationStrategy::Mean,
                AggregationStrategy::WeightedMean,
                AggregationStrategy::TopKMean,
            ] {
                let got = aggregate(strategy, &scores, k);
                prop_assert!((0.0..=1.0 + 1e-6).contains(&got), "{strategy:?} gave {got}");
            }
        }

        #[test]
        fn top_k_mean_never_rises_on_small_additions(
            scores in prop::collection::vec(0.0f32..=1.0, 3..16),
            extra in 0.0f32..=1.0,
        ) {
            let k = 3usize;
            let before = aggregate(AggregationStrategy::TopKMean, &scores, k);

            // Only additions no greater than the current k-th largest hold
            // the law; clamp the extra value under it.
            let mut sorted = scores.clone();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let kth = sorted[k - 1];
            let addition = extra.min(kth);

            let mut extended = scores.clone();
            extended.push(addition);
            let after = aggregate(AggregationStrategy::TopKMean, &extended, k);
            prop_assert!(after <= before + 1e-6);
        }
    }
}
