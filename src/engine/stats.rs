use serde::{Deserialize, Serialize};

/// Engine-wide counters; only grow for the engine's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    /// Queued frames replaced by a newer one before evaluation
    pub frames_superseded: u64,
    pub average_processing_time_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub pose_source_failures: u64,
}

impl PerformanceStats {
    /// Count a completed evaluation and fold its duration into the mean
    pub fn record_processing(&mut self, elapsed_ms: f64) {
        self.frames_processed += 1;
        let n = self.frames_processed as f64;
        self.average_processing_time_ms += (elapsed_ms - self.average_processing_time_ms) / n;
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}
