//! Pose-similarity result cache
//!
//! Frames whose key landmarks quantize to the same signature score the same,
//! so a hit reuses the stored analysis instead of running the scorer.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::pattern::{ExercisePattern, Phase};
use crate::pose::Pose;
use crate::scoring::{AspectScores, FeedbackItem};

/// Analysis reused on a signature hit
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub signature: String,
    pub form_score: f32,
    pub aspects: AspectScores,
    pub feedback: Vec<FeedbackItem>,
    pub phase: Phase,
    pub confidence: f32,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        if self.hits + self.misses == 0 {
            return 0.0;
        }
        self.hits as f32 / (self.hits + self.misses) as f32
    }
}

/// Exercise name followed by the key landmarks' x/y quantized to one
/// decimal digit. Missing landmarks quantize to `_`.
pub fn compute_signature(pose: &Pose, pattern: &ExercisePattern) -> String {
    let mut signature = String::with_capacity(pattern.name.len() + pattern.key_landmarks.len() * 8);
    signature.push_str(&pattern.name);
    for &idx in &pattern.key_landmarks {
        match pose.get(idx) {
            Some(lm) => {
                let _ = write!(signature, "|{},{}", quantize(lm.x), quantize(lm.y));
            }
            None => signature.push_str("|_"),
        }
    }
    signature
}

fn quantize(v: f32) -> i32 {
    if v.is_finite() {
        (v * 10.0).round() as i32
    } else {
        i32::MIN
    }
}

/// Bounded LRU map from pose signature to analysis
///
/// Not synchronized; the engine keeps it behind a mutex.
#[derive(Debug)]
pub struct ResultCache {
    enabled: bool,
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    /// Front = least recently used
    lru_order: VecDeque<String>,
    stats: CacheStats,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: true,
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity.min(4096)),
            lru_order: VecDeque::with_capacity(capacity.min(4096)),
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.capacity);
        cache.enabled = config.enabled;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Counts a hit or a miss; a hit becomes the most recently used entry
    pub fn lookup(&mut self, signature: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        match self.entries.get(signature) {
            Some(entry) => {
                let entry = entry.clone();
                self.stats.hits += 1;
                self.touch(signature);
                Some(entry)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Returns the evicted signature, if any
    pub fn store(&mut self, entry: CacheEntry) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let signature = entry.signature.clone();
        if self.entries.insert(signature.clone(), entry).is_some() {
            self.touch(&signature);
            return None;
        }
        self.lru_order.push_back(signature);

        if self.entries.len() <= self.capacity {
            return None;
        }
        let oldest = self.lru_order.pop_front()?;
        self.entries.remove(&oldest);
        self.stats.evictions += 1;
        tracing::debug!(signature = %oldest, capacity = self.capacity, "Evicted cache entry");
        Some(oldest)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru_order.clear();
    }

    fn touch(&mut self, signature: &str) {
        if let Some(pos) = self.lru_order.iter().position(|s| s == signature) {
            if let Some(key) = self.lru_order.remove(pos) {
                self.lru_order.push_back(key);
            }
        }
    }
}
