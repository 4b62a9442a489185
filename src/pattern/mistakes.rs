use crate::pose::{lean_from_vertical, offset_from_line, Landmark, LandmarkIndex, Pose};
use crate::scoring::Aspect;

use super::ExercisePattern;

/// Known technique faults, each with its own trigger threshold
#[derive(Debug, Clone, PartialEq)]
pub enum MistakeDetector {
    /// Knees collapse inwards: knee spread below `min_ratio` × ankle spread
    KneeValgus { min_ratio: f32 },
    /// Torso leans further than `max_deg` from vertical
    ForwardLean { max_deg: f32 },
    /// Hips drop below the shoulder–ankle line by more than `tolerance`
    HipSag { tolerance: f32 },
    /// Hips rise above the shoulder–ankle line by more than `tolerance`
    HipPike { tolerance: f32 },
    /// Elbows spread wider than `max_ratio` × wrist spread
    ElbowFlare { max_ratio: f32 },
    /// Left/right angle of `joint` differs by more than `max_diff_deg`
    AsymmetricDepth { joint: String, max_diff_deg: f32 },
    /// Hips drift sideways from under the shoulders by more than
    /// `max_offset` torso lengths
    BodySwing { max_offset: f32 },
}

/// A detector that fired on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct MistakeFinding {
    pub aspect: Aspect,
    pub body_part: &'static str,
    pub message: String,
    pub suggestion: &'static str,
    /// 0..=10
    pub severity: f32,
}

fn midpoint(pose: &Pose, a: LandmarkIndex, b: LandmarkIndex, threshold: f32) -> Option<Landmark> {
    let left = pose.visible(a.index(), threshold)?;
    let right = pose.visible(b.index(), threshold)?;
    Some(left.midpoint(right))
}

fn horizontal_spread(pose: &Pose, a: LandmarkIndex, b: LandmarkIndex, threshold: f32) -> Option<f32> {
    let left = pose.visible(a.index(), threshold)?;
    let right = pose.visible(b.index(), threshold)?;
    Some((left.x - right.x).abs())
}

/// Map how far past its threshold a measurement went onto 0..=10
fn severity_for(excess: f32, per_point: f32) -> f32 {
    (3.0 + excess / per_point).clamp(0.0, 10.0)
}

/// Spreads smaller than this mean the subject is side-on and
/// frontal-plane detectors cannot tell anything
const MIN_FRONTAL_SPREAD: f32 = 0.05;

impl MistakeDetector {
    pub fn detect(
        &self,
        pose: &Pose,
        pattern: &ExercisePattern,
        threshold: f32,
    ) -> Option<MistakeFinding> {
        use LandmarkIndex::*;

        match self {
            Self::KneeValgus { min_ratio } => {
                let ankles = horizontal_spread(pose, LeftAnkle, RightAnkle, threshold)?;
                let knees = horizontal_spread(pose, LeftKnee, RightKnee, threshold)?;
                if ankles < MIN_FRONTAL_SPREAD {
                    return None;
                }
                let ratio = knees / ankles;
                (ratio < *min_ratio).then(|| MistakeFinding {
                    aspect: Aspect::Alignment,
                    body_part: "knees",
                    message: "Knees are caving inward".to_string(),
                    suggestion: "Push your knees out so they track over your toes",
                    severity: severity_for(*min_ratio - ratio, 0.05),
                })
            }
            Self::ForwardLean { max_deg } => {
                let hips = midpoint(pose, LeftHip, RightHip, threshold)?;
                let shoulders = midpoint(pose, LeftShoulder, RightShoulder, threshold)?;
                let lean = lean_from_vertical(&hips, &shoulders)?;
                (lean > *max_deg).then(|| MistakeFinding {
                    aspect: Aspect::Posture,
                    body_part: "back",
                    message: format!("Torso leaning {:.0}° forward", lean),
                    suggestion: "Keep your chest up and your back neutral",
                    severity: severity_for(lean - max_deg, 3.0),
                })
            }
            Self::HipSag { tolerance } | Self::HipPike { tolerance } => {
                let shoulders = midpoint(pose, LeftShoulder, RightShoulder, threshold)?;
                let hips = midpoint(pose, LeftHip, RightHip, threshold)?;
                let ankles = midpoint(pose, LeftAnkle, RightAnkle, threshold)?;
                // only meaningful while the body is roughly horizontal
                if lean_from_vertical(&ankles, &shoulders)? < 45.0 {
                    return None;
                }
                let offset = offset_from_line(&shoulders, &ankles, &hips)?;
                match self {
                    Self::HipSag { .. } if offset < -tolerance => Some(MistakeFinding {
                        aspect: Aspect::Posture,
                        body_part: "core",
                        message: "Hips are sagging".to_string(),
                        suggestion: "Brace your core and squeeze your glutes",
                        severity: severity_for(-offset - tolerance, 0.01),
                    }),
                    Self::HipPike { .. } if offset > *tolerance => Some(MistakeFinding {
                        aspect: Aspect::Posture,
                        body_part: "hips",
                        message: "Hips are piked too high".to_string(),
                        suggestion: "Lower your hips into a straight line from head to heels",
                        severity: severity_for(offset - tolerance, 0.01),
                    }),
                    _ => None,
                }
            }
            Self::ElbowFlare { max_ratio } => {
                let wrists = horizontal_spread(pose, LeftWrist, RightWrist, threshold)?;
                let elbows = horizontal_spread(pose, LeftElbow, RightElbow, threshold)?;
                if wrists < MIN_FRONTAL_SPREAD {
                    return None;
                }
                let ratio = elbows / wrists;
                (ratio > *max_ratio).then(|| MistakeFinding {
                    aspect: Aspect::Alignment,
                    body_part: "elbows",
                    message: "Elbows flaring out".to_string(),
                    suggestion: "Tuck your elbows to roughly 45° from your torso",
                    severity: severity_for(ratio - max_ratio, 0.05),
                })
            }
            Self::AsymmetricDepth { joint, max_diff_deg } => {
                let joint = pattern.joint(joint)?;
                let diff = joint.measure(pose, threshold).asymmetry()?;
                (diff > *max_diff_deg).then(|| MistakeFinding {
                    aspect: Aspect::Alignment,
                    body_part: "balance",
                    message: format!("Uneven {} bend ({:.0}° difference)", joint.name, diff),
                    suggestion: "Distribute your weight evenly on both sides",
                    severity: severity_for(diff - max_diff_deg, 3.0),
                })
            }
            Self::BodySwing { max_offset } => {
                let shoulders = midpoint(pose, LeftShoulder, RightShoulder, threshold)?;
                let hips = midpoint(pose, LeftHip, RightHip, threshold)?;
                let torso = shoulders.distance_2d(&hips);
                if torso <= f32::EPSILON {
                    return None;
                }
                let offset = (hips.x - shoulders.x).abs() / torso;
                (offset > *max_offset).then(|| MistakeFinding {
                    aspect: Aspect::Stability,
                    body_part: "core",
                    message: "Body is swinging".to_string(),
                    suggestion: "Control the movement and avoid using momentum",
                    severity: severity_for(offset - max_offset, 0.02),
                })
            }
        }
    }
}
