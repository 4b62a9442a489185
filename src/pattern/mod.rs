//! Exercise definitions: phases, joints, target angle ranges and mistake
//! detectors for each supported exercise.

pub mod mistakes;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pose::{joint_angle, Pose};
use crate::scoring::Aspect;

pub use mistakes::{MistakeDetector, MistakeFinding};
pub use registry::PatternRegistry;

/// Named stage within one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preparation,
    Eccentric,
    Bottom,
    Concentric,
    Top,
    Rest,
    /// Static hold for isometric exercises
    Hold,
}

impl Phase {
    /// Phases where the body is not moving through the rep
    pub fn is_standing(self) -> bool {
        matches!(self, Phase::Preparation | Phase::Top | Phase::Rest | Phase::Hold)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::Eccentric => "eccentric",
            Phase::Bottom => "bottom",
            Phase::Concentric => "concentric",
            Phase::Top => "top",
            Phase::Rest => "rest",
            Phase::Hold => "hold",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive target range for a joint angle, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f32,
    pub max: f32,
}

impl AngleRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, angle: f32) -> bool {
        angle >= self.min && angle <= self.max
    }

    /// Degrees outside the range (0 when inside)
    pub fn deviation(&self, angle: f32) -> f32 {
        if angle < self.min {
            self.min - angle
        } else if angle > self.max {
            angle - self.max
        } else {
            0.0
        }
    }
}

/// Joint measured as the angle at `vertex` of a landmark triplet
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Body part reported in feedback ("knees", "hips", ...)
    pub body_part: String,
    pub aspect: Aspect,
    /// (first, vertex, last) on the left side
    pub left: [usize; 3],
    /// Mirrored triplet on the right side, if the joint is bilateral
    pub right: Option<[usize; 3]>,
}

/// Angle readings for both sides of a joint
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointReading {
    pub left: Option<f32>,
    pub right: Option<f32>,
}

impl JointReading {
    /// Mean of the visible sides
    pub fn mean(&self) -> Option<f32> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }

    /// Absolute left/right difference when both sides are visible
    pub fn asymmetry(&self) -> Option<f32> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l - r).abs()),
            _ => None,
        }
    }
}

impl Joint {
    pub fn measure(&self, pose: &Pose, visibility_threshold: f32) -> JointReading {
        let side = |[a, b, c]: [usize; 3]| {
            let first = pose.visible(a, visibility_threshold)?;
            let vertex = pose.visible(b, visibility_threshold)?;
            let last = pose.visible(c, visibility_threshold)?;
            joint_angle(first, vertex, last)
        };
        JointReading {
            left: side(self.left),
            right: self.right.and_then(side),
        }
    }

    pub fn landmarks(&self) -> impl Iterator<Item = usize> + '_ {
        self.left
            .iter()
            .chain(self.right.iter().flatten())
            .copied()
    }
}

/// Joint and thresholds that drive phase tracking
#[derive(Debug, Clone, PartialEq)]
pub struct DepthProfile {
    pub joint: String,
    /// Smoothed angle at or below which the rep reaches `bottom`
    pub bottom_deg: f32,
    /// Smoothed angle at or above which the body is extended (`top`)
    pub top_deg: f32,
}

/// Immutable definition of one exercise
#[derive(Debug, Clone)]
pub struct ExercisePattern {
    pub name: String,
    pub display_name: String,
    pub key_landmarks: Vec<usize>,
    /// Cyclic phase order, starting at `preparation`
    pub phases: Vec<Phase>,
    pub optimal_angles: BTreeMap<String, AngleRange>,
    pub joints: Vec<Joint>,
    /// `None` for isometric holds
    pub depth: Option<DepthProfile>,
    /// Fastest acceptable angular speed of the depth joint
    pub max_tempo_deg_per_s: f32,
    pub common_mistakes: Vec<MistakeDetector>,
}

impl ExercisePattern {
    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn depth_joint(&self) -> Option<&Joint> {
        self.depth.as_ref().and_then(|d| self.joint(&d.joint))
    }

    /// Phase that follows `phase` in the cyclic order
    pub fn next_phase(&self, phase: Phase) -> Option<Phase> {
        let pos = self.phases.iter().position(|&p| p == phase)?;
        Some(self.phases[(pos + 1) % self.phases.len()])
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn counts_reps(&self) -> bool {
        self.depth.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_range_deviation() {
        let range = AngleRange::new(70.0, 100.0);
        assert_eq!(range.deviation(85.0), 0.0);
        assert_eq!(range.deviation(60.0), 10.0);
        assert_eq!(range.deviation(110.0), 10.0);
        assert!(range.contains(70.0));
        assert!(!range.contains(69.9));
    }

    #[test]
    fn test_joint_reading() {
        let both = JointReading { left: Some(90.0), right: Some(100.0) };
        assert_eq!(both.mean(), Some(95.0));
        assert_eq!(both.asymmetry(), Some(10.0));
        let one = JointReading { left: None, right: Some(100.0) };
        assert_eq!(one.mean(), Some(100.0));
        assert_eq!(one.asymmetry(), None);
        assert_eq!(JointReading::default().mean(), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Concentric.to_string(), "concentric");
        assert!(Phase::Rest.is_standing());
        assert!(!Phase::Bottom.is_standing());
    }
}
