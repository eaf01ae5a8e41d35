use serde::{Deserialize, Serialize};

use super::strategy::AggregationStrategy;

/// One ranked artist in a `recommend` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub artist_id: u64,
    pub name: String,
    /// Aggregated match score in [0, 1].
    pub score: f32,
    /// URL of the single illustration that scored highest against the brief.
    pub top_illustration_url: String,
    /// How many of the artist's illustrations were scored.
    pub num_illustrations: usize,
    /// The strategy that produced `score`.
    pub aggregation_strategy: AggregationStrategy,
}
