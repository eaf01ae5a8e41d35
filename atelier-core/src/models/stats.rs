use serde::{Deserialize, Serialize};

/// Counters reported by the embedding cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub disk_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub hit_rate: f64,
}

/// Engine-level statistics for the facade's `stats()` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub artists_indexed: usize,
    pub cache_hit_rate: f64,
    pub avg_score: f64,
    pub avg_latency_ms: f64,
    /// Images embedded successfully over images attempted.
    pub processing_success_rate: f64,
    pub uptime_s: u64,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub artists_indexed: usize,
    pub artists_excluded: usize,
    pub images_embedded: usize,
    pub images_failed: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cancelled: bool,
}
