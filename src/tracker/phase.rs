use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::pattern::{ExercisePattern, Phase};
use crate::pose::Pose;
use crate::scoring::is_trackable;

use super::smooth::MovingAverage;

/// Tracker state after one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseUpdate {
    pub phase: Phase,
    pub rep_count: u32,
    /// A rep finished on this frame
    pub rep_completed: bool,
    pub smoothed_depth: Option<f32>,
    pub frozen: bool,
}

/// Per-session phase and repetition state machine
///
/// Standing phases (preparation/top/rest) step along the pattern's cyclic
/// order once held for `settle_frames`. Dropping below `top - hysteresis`
/// starts the eccentric phase; reaching `bottom` and coming back up past
/// `top` completes exactly one rep. Turning back up before `bottom` returns
/// to the standing phase the descent started from without counting.
pub struct PhaseTracker {
    pattern: Arc<ExercisePattern>,
    config: TrackerConfig,
    smoother: MovingAverage,
    phase: Phase,
    /// Standing phase the current descent started from
    origin: Phase,
    rep_count: u32,
    /// Frames held in the current standing phase
    dwell: u32,
    missing_streak: u32,
    frozen: bool,
}

impl PhaseTracker {
    pub fn new(pattern: Arc<ExercisePattern>, config: TrackerConfig) -> Self {
        let smoother = MovingAverage::new(config.smoothing_window);
        Self {
            pattern,
            config,
            smoother,
            phase: Phase::Preparation,
            origin: Phase::Preparation,
            rep_count: 0,
            dwell: 0,
            missing_streak: 0,
            frozen: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn pattern(&self) -> &Arc<ExercisePattern> {
        &self.pattern
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
        self.phase = Phase::Preparation;
        self.origin = Phase::Preparation;
        self.rep_count = 0;
        self.dwell = 0;
        self.missing_streak = 0;
        self.frozen = false;
    }

    pub fn update(&mut self, pose: &Pose) -> PhaseUpdate {
        let threshold = self.config.visibility_threshold;
        match self.pattern.depth_joint() {
            Some(joint) => {
                let depth = joint.measure(pose, threshold).mean();
                self.observe_depth(depth)
            }
            None => {
                let visible = is_trackable(pose, &self.pattern, threshold);
                self.observe_hold(visible)
            }
        }
    }

    /// Feed one raw depth-joint angle (`None` when the joint is not visible)
    pub fn observe_depth(&mut self, depth: Option<f32>) -> PhaseUpdate {
        let Some(angle) = depth.filter(|a| a.is_finite()) else {
            self.note_missing();
            return self.snapshot(false);
        };
        self.missing_streak = 0;
        self.frozen = false;

        let smoothed = self.smoother.apply(angle);
        // sparse frames can cross several thresholds at once; keep stepping
        // through the moving phases until the state settles
        let mut completed = false;
        for _ in 0..4 {
            let before = self.phase;
            completed |= self.step(smoothed);
            if self.phase == before || self.phase.is_standing() {
                break;
            }
        }
        self.snapshot(completed)
    }

    /// Isometric patterns: hold once the body has been visible for
    /// `settle_frames`
    pub fn observe_hold(&mut self, visible: bool) -> PhaseUpdate {
        if !visible {
            self.note_missing();
            return self.snapshot(false);
        }
        self.missing_streak = 0;
        self.frozen = false;
        if self.phase == Phase::Preparation {
            self.dwell += 1;
            if self.dwell >= self.config.settle_frames && self.pattern.has_phase(Phase::Hold) {
                self.transition(Phase::Hold);
            }
        }
        self.snapshot(false)
    }

    fn note_missing(&mut self) {
        self.missing_streak = self.missing_streak.saturating_add(1);
        if !self.frozen && self.missing_streak >= self.config.freeze_after_frames {
            self.frozen = true;
            self.smoother.reset();
            tracing::warn!(
                exercise = %self.pattern.name,
                phase = %self.phase,
                frames = self.missing_streak,
                "Key landmarks lost, freezing phase tracking"
            );
        }
    }

    /// Returns true when this step completed a rep
    fn step(&mut self, smoothed: f32) -> bool {
        let Some(depth) = self.pattern.depth.as_ref() else {
            return false;
        };
        let (top, bottom) = (depth.top_deg, depth.bottom_deg);
        let hysteresis = self.config.hysteresis_deg;

        match self.phase {
            current if current.is_standing() => {
                if smoothed < top - hysteresis {
                    self.origin = current;
                    self.transition(Phase::Eccentric);
                } else {
                    self.dwell += 1;
                    if self.dwell >= self.config.settle_frames {
                        if let Some(next) = self.pattern.next_phase(current) {
                            if next.is_standing() && next != current {
                                self.transition(next);
                            }
                        }
                    }
                }
                false
            }
            Phase::Eccentric => {
                if smoothed <= bottom {
                    self.transition(Phase::Bottom);
                } else if smoothed >= top {
                    // turned back before bottom: not a rep
                    let origin = self.origin;
                    self.transition(origin);
                }
                false
            }
            Phase::Bottom => {
                if smoothed > bottom + hysteresis {
                    self.transition(Phase::Concentric);
                }
                false
            }
            Phase::Concentric => {
                if smoothed >= top {
                    self.rep_count += 1;
                    self.transition(Phase::Top);
                    tracing::debug!(
                        exercise = %self.pattern.name,
                        reps = self.rep_count,
                        "Rep completed"
                    );
                    true
                } else {
                    if smoothed <= bottom {
                        self.transition(Phase::Bottom);
                    }
                    false
                }
            }
            _ => false,
        }
    }

    fn transition(&mut self, next: Phase) {
        if next != self.phase {
            tracing::debug!(exercise = %self.pattern.name, from = %self.phase, to = %next, "Phase transition");
            self.phase = next;
            self.dwell = 0;
        }
    }

    fn snapshot(&self, rep_completed: bool) -> PhaseUpdate {
        PhaseUpdate {
            phase: self.phase,
            rep_count: self.rep_count,
            rep_completed,
            smoothed_depth: self.smoother.value(),
            frozen: self.frozen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternRegistry;

    fn tracker(name: &str, window: usize) -> PhaseTracker {
        let pattern = PatternRegistry::builtin().unwrap().get(name).unwrap();
        let config = TrackerConfig {
            smoothing_window: window,
            ..TrackerConfig::default()
        };
        PhaseTracker::new(pattern, config)
    }

    fn feed(t: &mut PhaseTracker, values: &[(f32, usize)]) -> Vec<PhaseUpdate> {
        let mut out = Vec::new();
        for &(value, repeat) in values {
            for _ in 0..repeat {
                out.push(t.observe_depth(Some(value)));
            }
        }
        out
    }

    #[test]
    fn test_initial_state() {
        let t = tracker("squat", 5);
        assert_eq!(t.phase(), Phase::Preparation);
        assert_eq!(t.rep_count(), 0);
    }

    #[test]
    fn test_full_cycle_counts_one_rep() {
        let mut t = tracker("squat", 5);
        let updates = feed(&mut t, &[(170.0, 5), (90.0, 8), (170.0, 8)]);
        assert_eq!(t.rep_count(), 1);
        assert_eq!(updates.iter().filter(|u| u.rep_completed).count(), 1);

        // phases visited in cyclic order
        let mut visited: Vec<Phase> = Vec::new();
        for u in &updates {
            if visited.last() != Some(&u.phase) {
                visited.push(u.phase);
            }
        }
        assert_eq!(
            &visited[..5],
            &[Phase::Preparation, Phase::Eccentric, Phase::Bottom, Phase::Concentric, Phase::Top]
        );
    }

    #[test]
    fn test_partial_descent_is_not_a_rep() {
        let mut t = tracker("squat", 5);
        let updates = feed(&mut t, &[(170.0, 5), (130.0, 8), (170.0, 8)]);
        assert!(updates.iter().any(|u| u.phase == Phase::Eccentric));
        assert!(updates.iter().all(|u| u.phase != Phase::Bottom));
        assert_eq!(t.rep_count(), 0);
        assert_eq!(t.phase(), Phase::Preparation);
    }

    #[test]
    fn test_reversal_returns_to_origin_phase() {
        let mut t = tracker("squat", 1);
        feed(&mut t, &[(170.0, 1), (90.0, 1), (170.0, 1)]);
        assert_eq!(t.phase(), Phase::Top);
        // partial dip straight out of top
        feed(&mut t, &[(140.0, 1), (165.0, 1)]);
        assert_eq!(t.phase(), Phase::Top);
        assert_eq!(t.rep_count(), 1);
    }

    #[test]
    fn test_standing_phases_cycle_after_settling() {
        let mut t = tracker("squat", 1);
        feed(&mut t, &[(170.0, 1), (90.0, 1), (170.0, 1)]);
        assert_eq!(t.phase(), Phase::Top);
        feed(&mut t, &[(170.0, 3)]);
        assert_eq!(t.phase(), Phase::Rest);
        feed(&mut t, &[(170.0, 3)]);
        assert_eq!(t.phase(), Phase::Preparation);
        // preparation's successor is eccentric, so it stays put
        feed(&mut t, &[(170.0, 10)]);
        assert_eq!(t.phase(), Phase::Preparation);
    }

    #[test]
    fn test_multiple_reps_monotonic() {
        let mut t = tracker("squat", 3);
        let mut last = 0;
        for _ in 0..4 {
            for u in feed(&mut t, &[(90.0, 6), (170.0, 6)]) {
                assert!(u.rep_count >= last);
                last = u.rep_count;
            }
        }
        assert_eq!(t.rep_count(), 4);
    }

    #[test]
    fn test_jitter_at_threshold_does_not_double_count() {
        let mut t = tracker("squat", 1);
        feed(&mut t, &[(170.0, 1), (90.0, 1)]);
        assert_eq!(t.phase(), Phase::Bottom);
        // wobble around the bottom threshold stays inside the hysteresis band
        feed(&mut t, &[(102.0, 1), (99.0, 1), (104.0, 1), (98.0, 1)]);
        assert_eq!(t.phase(), Phase::Bottom);
        feed(&mut t, &[(170.0, 1), (158.0, 1), (161.0, 1)]);
        assert_eq!(t.rep_count(), 1);
    }

    #[test]
    fn test_missing_landmarks_freeze_progression() {
        let mut t = tracker("squat", 5);
        feed(&mut t, &[(170.0, 5), (90.0, 8)]);
        assert_eq!(t.phase(), Phase::Bottom);
        let mut last = None;
        for _ in 0..4 {
            last = Some(t.observe_depth(None));
        }
        let last = last.unwrap();
        assert!(last.frozen);
        assert_eq!(last.phase, Phase::Bottom);
        assert_eq!(last.smoothed_depth, None);
        assert_eq!(t.rep_count(), 0);

        // tracking resumes from the frozen phase
        let update = t.observe_depth(Some(95.0));
        assert!(!update.frozen);
        assert_eq!(update.phase, Phase::Bottom);
    }

    #[test]
    fn test_single_missing_frame_holds_without_freezing() {
        let mut t = tracker("squat", 5);
        feed(&mut t, &[(170.0, 3)]);
        let update = t.observe_depth(None);
        assert!(!update.frozen);
        assert_eq!(update.phase, Phase::Preparation);
        assert!(update.smoothed_depth.is_some());
    }

    #[test]
    fn test_plank_holds_and_never_counts() {
        let mut t = tracker("plank", 5);
        for _ in 0..5 {
            t.observe_hold(true);
        }
        assert_eq!(t.phase(), Phase::Hold);
        assert_eq!(t.rep_count(), 0);
        // depth values are ignored for holds
        feed(&mut t, &[(90.0, 5), (170.0, 5)]);
        assert_eq!(t.rep_count(), 0);
    }

    #[test]
    fn test_reset() {
        let mut t = tracker("squat", 1);
        feed(&mut t, &[(170.0, 1), (90.0, 1), (170.0, 1)]);
        t.reset();
        assert_eq!(t.rep_count(), 0);
        assert_eq!(t.phase(), Phase::Preparation);
    }
}
