//! Per-session state: tracker, scorer memory, bounded history and the
//! running analysis.

pub mod report;
pub mod summary;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheEntry;
use crate::config::{ScoringConfig, SessionConfig, TrackerConfig};
use crate::pattern::{ExercisePattern, Phase};
use crate::pose::Pose;
use crate::scoring::{is_trackable, pose_confidence, AspectScores, FeedbackItem, FormScorer};
use crate::tracker::PhaseTracker;

pub use report::{
    aggregate, consistency_score, AspectAnalysis, Correction, FrameAnalysisResponse, Priority,
    RepetitionAnalysis,
};
pub use summary::SessionSummary;

/// Unique identifier for an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Analysis of one processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub pose: Pose,
    /// 0..=100
    pub confidence: f32,
    pub timestamp_ms: u64,
    pub exercise_type: String,
    /// 0..=100
    pub form_score: f32,
    pub aspects: AspectScores,
    pub feedback: Vec<FeedbackItem>,
    pub rep_count: u32,
    pub phase: Phase,
    pub from_cache: bool,
}

impl FrameResult {
    pub fn to_cache_entry(&self, signature: String) -> CacheEntry {
        CacheEntry {
            signature,
            form_score: self.form_score,
            aspects: self.aspects,
            feedback: self.feedback.clone(),
            phase: self.phase,
            confidence: self.confidence,
        }
    }
}

/// One user's exercise session
pub struct AnalysisSession {
    id: SessionId,
    user_id: String,
    pattern: Arc<ExercisePattern>,
    start_ms: u64,
    last_update_ms: u64,
    history: Vec<FrameResult>,
    tracker: PhaseTracker,
    scorer: FormScorer,
    tracker_config: TrackerConfig,
    config: SessionConfig,
    /// Reps counted under earlier exercises of this session
    carried_reps: u32,
    /// Mean form score of each completed rep
    rep_scores: Vec<f32>,
    current_rep: (f32, u32),
    /// Flag count per body part, first-seen order; survives history trims
    issue_counts: Vec<(String, u32)>,
    report: FrameAnalysisResponse,
}

impl AnalysisSession {
    pub fn new(
        id: SessionId,
        user_id: impl Into<String>,
        pattern: Arc<ExercisePattern>,
        start_ms: u64,
        tracker_config: &TrackerConfig,
        scoring_config: &ScoringConfig,
        config: &SessionConfig,
    ) -> Self {
        let tracker = PhaseTracker::new(Arc::clone(&pattern), tracker_config.clone());
        let scorer = FormScorer::new(scoring_config.clone(), tracker_config.visibility_threshold);
        Self {
            id,
            user_id: user_id.into(),
            pattern,
            start_ms,
            last_update_ms: start_ms,
            history: Vec::new(),
            tracker,
            scorer,
            tracker_config: tracker_config.clone(),
            config: config.clone(),
            carried_reps: 0,
            rep_scores: Vec::new(),
            current_rep: (0.0, 0),
            issue_counts: Vec::new(),
            report: FrameAnalysisResponse::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn pattern(&self) -> &Arc<ExercisePattern> {
        &self.pattern
    }

    pub fn exercise_type(&self) -> &str {
        &self.pattern.name
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn history(&self) -> &[FrameResult] {
        &self.history
    }

    pub fn latest(&self) -> Option<&FrameResult> {
        self.history.last()
    }

    pub fn rep_count(&self) -> u32 {
        self.carried_reps + self.tracker.rep_count()
    }

    pub fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    pub fn analysis(&self) -> &FrameAnalysisResponse {
        &self.report
    }

    /// Enough key landmarks visible to track and cache the frame
    pub fn is_trackable(&self, pose: &Pose) -> bool {
        is_trackable(pose, &self.pattern, self.tracker_config.visibility_threshold)
    }

    /// Full pipeline: advance the tracker and score the frame
    pub fn evaluate(&mut self, pose: Pose, timestamp_ms: u64) -> FrameResult {
        let update = self.tracker.update(&pose);
        let score = self.scorer.score(&pose, &self.pattern, timestamp_ms);
        FrameResult {
            confidence: pose_confidence(&pose, &self.pattern),
            pose,
            timestamp_ms,
            exercise_type: self.pattern.name.clone(),
            form_score: score.form_score,
            aspects: score.aspects,
            feedback: score.feedback,
            rep_count: self.carried_reps + update.rep_count,
            phase: update.phase,
            from_cache: false,
        }
    }

    /// Rebuild a result from a cache hit
    ///
    /// Form judgment comes from the entry; the tracker and the scorer's
    /// motion reference still see the frame, so reps and phase stay live.
    pub fn result_from_cache(&mut self, entry: CacheEntry, pose: Pose, timestamp_ms: u64) -> FrameResult {
        let update = self.tracker.update(&pose);
        self.scorer.observe(&pose, &self.pattern, timestamp_ms);
        FrameResult {
            pose,
            confidence: entry.confidence,
            timestamp_ms,
            exercise_type: self.pattern.name.clone(),
            form_score: entry.form_score,
            aspects: entry.aspects,
            feedback: entry.feedback,
            rep_count: self.carried_reps + update.rep_count,
            phase: update.phase,
            from_cache: true,
        }
    }

    /// Append a processed frame and refresh the running analysis
    pub fn record(&mut self, result: FrameResult) {
        let previous_reps = self.latest().map_or(self.carried_reps, |r| r.rep_count);
        self.last_update_ms = self.last_update_ms.max(result.timestamp_ms);

        self.current_rep.0 += result.form_score;
        self.current_rep.1 += 1;
        if result.rep_count > previous_reps {
            let (sum, frames) = self.current_rep;
            self.rep_scores.push(sum / frames as f32);
            self.current_rep = (0.0, 0);
        }

        for item in result.feedback.iter().filter(|f| f.is_issue()) {
            match self.issue_counts.iter_mut().find(|(part, _)| *part == item.body_part) {
                Some((_, n)) => *n += 1,
                None => self.issue_counts.push((item.body_part.clone(), 1)),
            }
        }

        self.history.push(result);
        if self.history.len() > self.config.history_cap {
            let keep = self.config.history_keep.min(self.config.history_cap);
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }

        self.report = aggregate(
            &self.history,
            &self.rep_scores,
            self.rep_count(),
            self.config.quality_rep_threshold,
        );
    }

    /// Switch exercise: fresh tracker and history, reps carried forward
    pub fn set_pattern(&mut self, pattern: Arc<ExercisePattern>) {
        self.carried_reps = self.rep_count();
        self.tracker = PhaseTracker::new(Arc::clone(&pattern), self.tracker_config.clone());
        self.scorer.reset();
        self.pattern = pattern;
        self.history.clear();
        self.rep_scores.clear();
        self.current_rep = (0.0, 0);
        self.report = aggregate(&[], &[], self.rep_count(), self.config.quality_rep_threshold);
    }

    pub fn summary(&self) -> SessionSummary {
        let average_score = self.report.overall_score;
        let total_reps = self.rep_count();
        let consistency = self.report.repetition_analysis.consistency_score;
        let improvement_areas = summary::improvement_areas(&self.issue_counts);
        let next_session_recommendations = summary::next_session_recommendations(&improvement_areas);
        SessionSummary {
            session_id: self.id,
            user_id: self.user_id.clone(),
            exercise_type: self.pattern.name.clone(),
            duration_ms: self.last_update_ms.saturating_sub(self.start_ms),
            total_reps,
            average_score,
            consistency_score: consistency,
            achievements: summary::achievements(average_score, total_reps, consistency, self.history.len()),
            improvement_areas,
            next_session_recommendations,
        }
    }
}
