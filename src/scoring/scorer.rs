use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::pattern::ExercisePattern;
use crate::pose::{Landmark, LandmarkIndex, Pose};

use super::feedback::{Aspect, AspectScores, FeedbackItem};

/// Frames at or above this score with no issues earn a success item
const SUCCESS_SCORE: f32 = 90.0;

/// Minimum fraction of key landmarks that must be visible for a frame to be
/// analysed normally (tracked, cached)
pub const TRACKABLE_FRACTION: f32 = 0.5;

/// Output of scoring one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameScore {
    pub form_score: f32,
    pub aspects: AspectScores,
    pub feedback: Vec<FeedbackItem>,
}

/// Mean visibility of the pattern's key landmarks, as 0..=100
pub fn pose_confidence(pose: &Pose, pattern: &ExercisePattern) -> f32 {
    (pose.mean_visibility(&pattern.key_landmarks) * 100.0).clamp(0.0, 100.0)
}

pub fn is_trackable(pose: &Pose, pattern: &ExercisePattern, visibility_threshold: f32) -> bool {
    pose.visible_fraction(&pattern.key_landmarks, visibility_threshold) >= TRACKABLE_FRACTION
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp_ms: u64,
    depth_angle: Option<f32>,
    hip_center: Option<Landmark>,
    torso_length: Option<f32>,
}

/// Scores single frames against an exercise pattern
///
/// Remembers the previously scored frame so timing and stability can be
/// judged from frame-to-frame motion. One scorer per session.
#[derive(Debug, Clone)]
pub struct FormScorer {
    config: ScoringConfig,
    visibility_threshold: f32,
    previous: Option<Sample>,
}

impl FormScorer {
    pub fn new(config: ScoringConfig, visibility_threshold: f32) -> Self {
        Self {
            config,
            visibility_threshold,
            previous: None,
        }
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn severity(&self, deviation_deg: f32) -> f32 {
        (deviation_deg / self.config.severity_deg_per_point).clamp(0.0, 10.0)
    }

    pub fn score(&mut self, pose: &Pose, pattern: &ExercisePattern, timestamp_ms: u64) -> FrameScore {
        let threshold = self.visibility_threshold;
        let mut feedback = Vec::new();
        // per-aspect deductions, in score points
        let mut deductions: HashMap<Aspect, f32> = HashMap::new();
        let mut asymmetries = Vec::new();
        let mut measured = 0usize;

        for (name, range) in &pattern.optimal_angles {
            let Some(joint) = pattern.joint(name) else { continue };
            let reading = joint.measure(pose, threshold);
            let Some(angle) = reading.mean() else { continue };
            measured += 1;
            if let Some(diff) = reading.asymmetry() {
                asymmetries.push(diff);
            }

            let deviation = range.deviation(angle);
            if deviation <= 0.0 {
                continue;
            }
            let severity = self.severity(deviation);
            *deductions.entry(joint.aspect).or_default() += severity * 10.0;
            let (direction, suggestion) = if angle < range.min {
                ("below", format!("Open up your {} a little more", joint.body_part))
            } else {
                ("above", format!("Bend your {} a little more", joint.body_part))
            };
            feedback.push(FeedbackItem::graded(
                joint.aspect,
                joint.body_part.clone(),
                format!(
                    "{} angle {:.0}° is {} the {:.0}–{:.0}° target",
                    joint.name, angle, direction, range.min, range.max
                ),
                severity,
                Some(suggestion),
            ));
        }

        if measured == 0 {
            self.previous = None;
            return FrameScore {
                form_score: 0.0,
                aspects: AspectScores::ZERO,
                feedback: vec![FeedbackItem::graded(
                    Aspect::Posture,
                    "camera",
                    "Key body parts are not visible",
                    5.0,
                    Some("Move fully into the camera frame".to_string()),
                )],
            };
        }

        let mut mistake_total = 0.0;
        for detector in &pattern.common_mistakes {
            if let Some(found) = detector.detect(pose, pattern, threshold) {
                mistake_total += found.severity;
                *deductions.entry(found.aspect).or_default() += found.severity * 5.0;
                feedback.push(FeedbackItem::graded(
                    found.aspect,
                    found.body_part,
                    found.message,
                    found.severity,
                    Some(found.suggestion.to_string()),
                ));
            }
        }

        let sample = self.sample(pose, pattern, timestamp_ms);
        let timing = self.timing(&sample, pattern, &mut feedback);
        let stability = self.stability(&sample);
        self.previous = Some(sample);

        let mean_asymmetry = if asymmetries.is_empty() {
            0.0
        } else {
            asymmetries.iter().sum::<f32>() / asymmetries.len() as f32
        };

        let deduct = |aspect: Aspect| deductions.get(&aspect).copied().unwrap_or(0.0);
        let aspects = AspectScores {
            posture: clamp_score(100.0 - deduct(Aspect::Posture)),
            alignment: clamp_score(100.0 - 2.0 * mean_asymmetry - deduct(Aspect::Alignment)),
            range_of_motion: clamp_score(100.0 - deduct(Aspect::RangeOfMotion)),
            timing: clamp_score(timing - deduct(Aspect::Timing)),
            stability: clamp_score(stability - deduct(Aspect::Stability)),
        };

        let w = &self.config.weights;
        let weighted = (w.posture * aspects.posture
            + w.alignment * aspects.alignment
            + w.range_of_motion * aspects.range_of_motion
            + w.timing * aspects.timing
            + w.stability * aspects.stability)
            / w.total();
        let form_score = clamp_score(weighted - self.config.mistake_penalty * mistake_total);

        if form_score >= SUCCESS_SCORE && !feedback.iter().any(FeedbackItem::is_issue) {
            feedback.push(FeedbackItem::success("Great form, keep it up"));
        }

        FrameScore {
            form_score,
            aspects,
            feedback,
        }
    }

    /// Remember a frame whose score came from elsewhere (a cache hit) so the
    /// next scored frame measures motion from it
    pub fn observe(&mut self, pose: &Pose, pattern: &ExercisePattern, timestamp_ms: u64) {
        self.previous = Some(self.sample(pose, pattern, timestamp_ms));
    }

    fn sample(&self, pose: &Pose, pattern: &ExercisePattern, timestamp_ms: u64) -> Sample {
        let threshold = self.visibility_threshold;
        let depth_angle = pattern
            .depth_joint()
            .and_then(|joint| joint.measure(pose, threshold).mean());
        let mid = |a: LandmarkIndex, b: LandmarkIndex| {
            let l = pose.visible(a.index(), threshold)?;
            let r = pose.visible(b.index(), threshold)?;
            Some(l.midpoint(r))
        };
        let hip_center = mid(LandmarkIndex::LeftHip, LandmarkIndex::RightHip);
        let shoulder_center = mid(LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder);
        let torso_length = match (hip_center, shoulder_center) {
            (Some(h), Some(s)) => Some(h.distance_2d(&s)).filter(|&d| d > f32::EPSILON),
            _ => None,
        };
        Sample {
            timestamp_ms,
            depth_angle,
            hip_center,
            torso_length,
        }
    }

    /// 100 unless the depth joint moves faster than the pattern's tempo limit
    fn timing(&self, sample: &Sample, pattern: &ExercisePattern, feedback: &mut Vec<FeedbackItem>) -> f32 {
        let Some(prev) = self.previous else { return 100.0 };
        let (Some(now_angle), Some(prev_angle)) = (sample.depth_angle, prev.depth_angle) else {
            return 100.0;
        };
        let dt_ms = sample.timestamp_ms.saturating_sub(prev.timestamp_ms);
        if dt_ms == 0 || pattern.max_tempo_deg_per_s <= 0.0 {
            return 100.0;
        }
        let speed = (now_angle - prev_angle).abs() / (dt_ms as f32 / 1000.0);
        let over = (speed - pattern.max_tempo_deg_per_s) / pattern.max_tempo_deg_per_s;
        if over <= 0.0 {
            return 100.0;
        }
        feedback.push(FeedbackItem::graded(
            Aspect::Timing,
            "tempo",
            "Moving too fast",
            over * 10.0,
            Some("Slow down and control each phase of the movement".to_string()),
        ));
        100.0 - over * 100.0
    }

    /// Penalizes sideways drift of the hip centre between frames
    fn stability(&self, sample: &Sample) -> f32 {
        let Some(prev) = self.previous else { return 100.0 };
        match (sample.hip_center, prev.hip_center, sample.torso_length) {
            (Some(now), Some(before), Some(torso)) => {
                let drift = (now.x - before.x).abs() / torso;
                100.0 - drift * 300.0
            }
            _ => 100.0,
        }
    }
}

fn clamp_score(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
