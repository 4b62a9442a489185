use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::pose::LandmarkIndex::{self, *};
use crate::scoring::Aspect;

use super::{AngleRange, DepthProfile, ExercisePattern, Joint, MistakeDetector, Phase};

/// Read-only table of exercise patterns, shared across sessions
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: HashMap<String, Arc<ExercisePattern>>,
}

/// Lowercase, with `-` and spaces folded to `_`
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

impl PatternRegistry {
    /// Registry with the built-in exercises
    pub fn builtin() -> EngineResult<Self> {
        Self::from_patterns(builtin_patterns())
    }

    /// Validates every pattern; any inconsistency is fatal
    pub fn from_patterns(patterns: Vec<ExercisePattern>) -> EngineResult<Self> {
        let mut table = HashMap::with_capacity(patterns.len());
        for pattern in patterns {
            validate(&pattern)?;
            let key = normalize_name(&pattern.name);
            if table.insert(key, Arc::new(pattern)).is_some() {
                return Err(EngineError::registry("duplicate exercise name"));
            }
        }
        if table.is_empty() {
            return Err(EngineError::registry("no exercises defined"));
        }
        Ok(Self { patterns: table })
    }

    pub fn get(&self, name: &str) -> EngineResult<Arc<ExercisePattern>> {
        self.patterns
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "unknown exercise '{}' (supported: {})",
                    name,
                    self.supported_exercises().join(", ")
                ))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(&normalize_name(name))
    }

    /// Sorted exercise names
    pub fn supported_exercises(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patterns.keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate(pattern: &ExercisePattern) -> EngineResult<()> {
    let fail = |what: String| Err(EngineError::registry(format!("{}: {}", pattern.name, what)));

    if pattern.name.trim().is_empty() {
        return fail("empty name".to_string());
    }
    if pattern.phases.first() != Some(&Phase::Preparation) {
        return fail("phases must start with preparation".to_string());
    }
    if pattern.key_landmarks.is_empty() {
        return fail("no key landmarks".to_string());
    }
    if let Some(&idx) = pattern.key_landmarks.iter().find(|&&i| i >= LandmarkIndex::COUNT) {
        return fail(format!("key landmark {} out of range", idx));
    }
    for joint in &pattern.joints {
        if let Some(idx) = joint.landmarks().find(|&i| i >= LandmarkIndex::COUNT) {
            return fail(format!("joint {} uses landmark {} out of range", joint.name, idx));
        }
    }
    for (name, range) in &pattern.optimal_angles {
        if !(range.min < range.max) {
            return fail(format!("range for {} is empty", name));
        }
        if pattern.joint(name).is_none() {
            return fail(format!("no joint definition for {}", name));
        }
    }
    if let Some(depth) = &pattern.depth {
        let Some(range) = pattern.optimal_angles.get(&depth.joint) else {
            return fail(format!("depth joint {} has no target range", depth.joint));
        };
        if !(depth.bottom_deg < depth.top_deg)
            || !range.contains(depth.bottom_deg)
            || !range.contains(depth.top_deg)
        {
            return fail(format!("depth thresholds for {} outside its range", depth.joint));
        }
        for phase in [Phase::Eccentric, Phase::Bottom, Phase::Concentric, Phase::Top] {
            if !pattern.has_phase(phase) {
                return fail(format!("rep cycle is missing the {} phase", phase));
            }
        }
    }
    for mistake in &pattern.common_mistakes {
        if let MistakeDetector::AsymmetricDepth { joint, .. } = mistake {
            if pattern.joint(joint).is_none() {
                return fail(format!("mistake detector references unknown joint {}", joint));
            }
        }
    }
    Ok(())
}

fn joint(name: &str, body_part: &str, aspect: Aspect, left: [LandmarkIndex; 3], right: [LandmarkIndex; 3]) -> Joint {
    Joint {
        name: name.to_string(),
        body_part: body_part.to_string(),
        aspect,
        left: left.map(LandmarkIndex::index),
        right: Some(right.map(LandmarkIndex::index)),
    }
}

fn knee() -> Joint {
    joint("knee", "knees", Aspect::RangeOfMotion, [LeftHip, LeftKnee, LeftAnkle], [RightHip, RightKnee, RightAnkle])
}

fn hip() -> Joint {
    joint("hip", "hips", Aspect::Posture, [LeftShoulder, LeftHip, LeftKnee], [RightShoulder, RightHip, RightKnee])
}

fn elbow() -> Joint {
    joint("elbow", "elbows", Aspect::RangeOfMotion, [LeftShoulder, LeftElbow, LeftWrist], [RightShoulder, RightElbow, RightWrist])
}

fn shoulder() -> Joint {
    joint("shoulder", "shoulders", Aspect::Posture, [LeftElbow, LeftShoulder, LeftHip], [RightElbow, RightShoulder, RightHip])
}

fn body_line() -> Joint {
    joint("body_line", "core", Aspect::Posture, [LeftShoulder, LeftHip, LeftAnkle], [RightShoulder, RightHip, RightAnkle])
}

fn indices(points: &[LandmarkIndex]) -> Vec<usize> {
    points.iter().map(|p| p.index()).collect()
}

fn ranges(entries: &[(&str, f32, f32)]) -> BTreeMap<String, AngleRange> {
    entries
        .iter()
        .map(|&(name, min, max)| (name.to_string(), AngleRange::new(min, max)))
        .collect()
}

fn depth(joint: &str, bottom_deg: f32, top_deg: f32) -> Option<DepthProfile> {
    Some(DepthProfile {
        joint: joint.to_string(),
        bottom_deg,
        top_deg,
    })
}

const FULL_CYCLE: [Phase; 6] = [
    Phase::Preparation,
    Phase::Eccentric,
    Phase::Bottom,
    Phase::Concentric,
    Phase::Top,
    Phase::Rest,
];

const LOWER_BODY: [LandmarkIndex; 8] = [
    LeftShoulder, RightShoulder, LeftHip, RightHip, LeftKnee, RightKnee, LeftAnkle, RightAnkle,
];

const UPPER_BODY: [LandmarkIndex; 8] = [
    LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist, LeftHip, RightHip,
];

fn builtin_patterns() -> Vec<ExercisePattern> {
    vec![
        ExercisePattern {
            name: "squat".to_string(),
            display_name: "Squat".to_string(),
            key_landmarks: indices(&LOWER_BODY),
            phases: FULL_CYCLE.to_vec(),
            optimal_angles: ranges(&[("knee", 70.0, 180.0), ("hip", 50.0, 180.0)]),
            joints: vec![knee(), hip()],
            depth: depth("knee", 100.0, 160.0),
            max_tempo_deg_per_s: 240.0,
            common_mistakes: vec![
                MistakeDetector::KneeValgus { min_ratio: 0.8 },
                MistakeDetector::ForwardLean { max_deg: 45.0 },
                MistakeDetector::AsymmetricDepth { joint: "knee".to_string(), max_diff_deg: 15.0 },
            ],
        },
        ExercisePattern {
            name: "deadlift".to_string(),
            display_name: "Deadlift".to_string(),
            key_landmarks: indices(&LOWER_BODY),
            phases: FULL_CYCLE.to_vec(),
            optimal_angles: ranges(&[("hip", 45.0, 180.0), ("knee", 110.0, 180.0)]),
            joints: vec![hip(), knee()],
            depth: depth("hip", 100.0, 165.0),
            max_tempo_deg_per_s: 180.0,
            common_mistakes: vec![
                MistakeDetector::ForwardLean { max_deg: 70.0 },
                MistakeDetector::AsymmetricDepth { joint: "hip".to_string(), max_diff_deg: 15.0 },
            ],
        },
        ExercisePattern {
            name: "push_up".to_string(),
            display_name: "Push-Up".to_string(),
            key_landmarks: indices(&[
                LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist,
                LeftHip, RightHip, LeftAnkle, RightAnkle,
            ]),
            phases: FULL_CYCLE[..5].to_vec(),
            optimal_angles: ranges(&[("elbow", 70.0, 180.0), ("body_line", 160.0, 180.0)]),
            joints: vec![elbow(), body_line()],
            depth: depth("elbow", 100.0, 155.0),
            max_tempo_deg_per_s: 300.0,
            common_mistakes: vec![
                MistakeDetector::HipSag { tolerance: 0.05 },
                MistakeDetector::HipPike { tolerance: 0.05 },
                MistakeDetector::AsymmetricDepth { joint: "elbow".to_string(), max_diff_deg: 20.0 },
            ],
        },
        ExercisePattern {
            name: "bench_press".to_string(),
            display_name: "Bench Press".to_string(),
            key_landmarks: indices(&UPPER_BODY[..6]),
            phases: FULL_CYCLE.to_vec(),
            optimal_angles: ranges(&[("elbow", 70.0, 180.0)]),
            joints: vec![elbow()],
            depth: depth("elbow", 100.0, 155.0),
            max_tempo_deg_per_s: 240.0,
            common_mistakes: vec![
                MistakeDetector::ElbowFlare { max_ratio: 1.3 },
                MistakeDetector::AsymmetricDepth { joint: "elbow".to_string(), max_diff_deg: 15.0 },
            ],
        },
        ExercisePattern {
            name: "pull_up".to_string(),
            display_name: "Pull-Up".to_string(),
            key_landmarks: indices(&UPPER_BODY),
            phases: FULL_CYCLE.to_vec(),
            optimal_angles: ranges(&[("elbow", 40.0, 180.0), ("shoulder", 0.0, 180.0)]),
            joints: vec![elbow(), shoulder()],
            depth: depth("elbow", 90.0, 150.0),
            max_tempo_deg_per_s: 270.0,
            common_mistakes: vec![
                MistakeDetector::BodySwing { max_offset: 0.15 },
                MistakeDetector::AsymmetricDepth { joint: "elbow".to_string(), max_diff_deg: 20.0 },
            ],
        },
        ExercisePattern {
            name: "lunge".to_string(),
            display_name: "Lunge".to_string(),
            key_landmarks: indices(&LOWER_BODY),
            phases: FULL_CYCLE.to_vec(),
            optimal_angles: ranges(&[("knee", 80.0, 180.0), ("hip", 70.0, 180.0)]),
            joints: vec![knee(), hip()],
            depth: depth("knee", 110.0, 160.0),
            max_tempo_deg_per_s: 240.0,
            common_mistakes: vec![
                MistakeDetector::ForwardLean { max_deg: 30.0 },
                MistakeDetector::KneeValgus { min_ratio: 0.8 },
            ],
        },
        ExercisePattern {
            name: "plank".to_string(),
            display_name: "Plank".to_string(),
            key_landmarks: indices(&[
                LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftHip, RightHip,
                LeftAnkle, RightAnkle,
            ]),
            phases: vec![Phase::Preparation, Phase::Hold],
            optimal_angles: ranges(&[("body_line", 165.0, 180.0), ("elbow", 70.0, 180.0)]),
            joints: vec![body_line(), elbow()],
            depth: None,
            max_tempo_deg_per_s: 60.0,
            common_mistakes: vec![
                MistakeDetector::HipSag { tolerance: 0.04 },
                MistakeDetector::HipPike { tolerance: 0.04 },
            ],
        },
    ]
}
