use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Per-frame time budget in ms (16 = 60fps)
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Max cached signatures before LRU eviction
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Moving average length for the depth signal
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// Degrees the signal must move past a threshold before reversing phase
    #[serde(default = "default_hysteresis_deg")]
    pub hysteresis_deg: f32,
    /// Frames a standing phase is held before advancing to the next one
    #[serde(default = "default_settle_frames")]
    pub settle_frames: u32,
    /// Consecutive invisible frames before tracking freezes
    #[serde(default = "default_freeze_after_frames")]
    pub freeze_after_frames: u32,
    /// Minimum landmark visibility to trust a coordinate
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: AspectWeights,
    /// Degrees of deviation per severity point
    #[serde(default = "default_severity_deg_per_point")]
    pub severity_deg_per_point: f32,
    /// Score subtracted per severity point of a detected mistake
    #[serde(default = "default_mistake_penalty")]
    pub mistake_penalty: f32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AspectWeights {
    #[serde(default = "default_weight_posture")]
    pub posture: f32,
    #[serde(default = "default_weight_alignment")]
    pub alignment: f32,
    #[serde(default = "default_weight_range_of_motion")]
    pub range_of_motion: f32,
    #[serde(default = "default_weight_timing")]
    pub timing: f32,
    #[serde(default = "default_weight_stability")]
    pub stability: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// History length that triggers a trim
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Entries kept after a trim
    #[serde(default = "default_history_keep")]
    pub history_keep: usize,
    /// Minimum score for a rep (or frame) to count as a quality rep
    #[serde(default = "default_quality_rep_threshold")]
    pub quality_rep_threshold: f32,
}

fn default_true() -> bool { true }
fn default_frame_budget_ms() -> u64 { 16 }
fn default_cache_capacity() -> usize { 1000 }
fn default_smoothing_window() -> usize { 5 }
fn default_hysteresis_deg() -> f32 { 5.0 }
fn default_settle_frames() -> u32 { 3 }
fn default_freeze_after_frames() -> u32 { 3 }
fn default_visibility_threshold() -> f32 { 0.5 }
fn default_severity_deg_per_point() -> f32 { 3.0 }
fn default_mistake_penalty() -> f32 { 1.5 }
fn default_weight_posture() -> f32 { 0.30 }
fn default_weight_alignment() -> f32 { 0.25 }
fn default_weight_range_of_motion() -> f32 { 0.20 }
fn default_weight_timing() -> f32 { 0.10 }
fn default_weight_stability() -> f32 { 0.15 }
fn default_history_cap() -> usize { 100 }
fn default_history_keep() -> usize { 50 }
fn default_quality_rep_threshold() -> f32 { 75.0 }

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: default_frame_budget_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            smoothing_window: default_smoothing_window(),
            hysteresis_deg: default_hysteresis_deg(),
            settle_frames: default_settle_frames(),
            freeze_after_frames: default_freeze_after_frames(),
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: AspectWeights::default(),
            severity_deg_per_point: default_severity_deg_per_point(),
            mistake_penalty: default_mistake_penalty(),
        }
    }
}

impl Default for AspectWeights {
    fn default() -> Self {
        Self {
            posture: default_weight_posture(),
            alignment: default_weight_alignment(),
            range_of_motion: default_weight_range_of_motion(),
            timing: default_weight_timing(),
            stability: default_weight_stability(),
        }
    }
}

impl AspectWeights {
    pub fn total(&self) -> f32 {
        self.posture + self.alignment + self.range_of_motion + self.timing + self.stability
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            history_keep: default_history_keep(),
            quality_rep_threshold: default_quality_rep_threshold(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid config TOML")?;
        Ok(config.sanitized())
    }

    /// Falls back to defaults when the file is missing or unreadable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, path = %path.as_ref().display(), "Using default config");
                Self::default()
            }
        }
    }

    /// Clamp values that would break invariants downstream
    fn sanitized(mut self) -> Self {
        self.cache.capacity = self.cache.capacity.max(1);
        self.tracker.smoothing_window = self.tracker.smoothing_window.max(1);
        self.tracker.freeze_after_frames = self.tracker.freeze_after_frames.max(1);
        self.tracker.visibility_threshold = self.tracker.visibility_threshold.clamp(0.0, 1.0);
        self.scoring.severity_deg_per_point = self.scoring.severity_deg_per_point.max(0.1);
        self.session.history_cap = self.session.history_cap.max(1);
        self.session.history_keep = self.session.history_keep.clamp(1, self.session.history_cap);
        if self.scoring.weights.total() <= 0.0 {
            self.scoring.weights = AspectWeights::default();
        }
        self
    }
}
