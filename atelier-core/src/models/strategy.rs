use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a vector of per-illustration scores collapses into one artist score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    #[default]
    Max,
    Mean,
    WeightedMean,
    TopKMean,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::WeightedMean => "weighted_mean",
            Self::TopKMean => "top_k_mean",
        }
    }
}

impl FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "weighted_mean" => Ok(Self::WeightedMean),
            "top_k_mean" => Ok(Self::TopKMean),
            other => Err(format!("unknown aggregation strategy {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_names() {
        for name in ["max", "mean", "weighted_mean", "top_k_mean"] {
            let strategy: AggregationStrategy = name.parse().unwrap();
            assert_eq!(strategy.as_str(), name);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("median".parse::<AggregationStrategy>().is_err());
        assert!("MAX".parse::<AggregationStrategy>().is_err());
    }
}
