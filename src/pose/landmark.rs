use serde::{Deserialize, Serialize};

/// BlazePose 33-landmark indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single tracked body landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X (0.0..1.0 of image width)
    pub x: f32,
    /// Normalized Y (0.0..1.0 of image height, downwards)
    pub y: f32,
    /// Depth relative to the hip midpoint, same scale as x
    #[serde(default)]
    pub z: f32,
    /// Visibility score (0.0..1.0); absent means fully visible
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

fn default_visibility() -> f32 { 1.0 }

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: visibility.clamp(0.0, 1.0),
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold && self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance in the image plane
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
            visibility: self.visibility.min(other.visibility),
        }
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 0.0,
        }
    }
}

/// Landmarks for one frame, ordered by [`LandmarkIndex`]
///
/// Pose sources may deliver short or malformed landmark lists; any index
/// that is absent reads as invisible rather than panicking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn landmark(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.get(index.index())
    }

    /// Landmark at `index` if it clears the visibility threshold
    pub fn visible(&self, index: usize, threshold: f32) -> Option<&Landmark> {
        self.get(index).filter(|lm| lm.is_visible(threshold))
    }

    /// Mean visibility over the given indices (missing indices count as 0)
    pub fn mean_visibility(&self, indices: &[usize]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f32 = indices
            .iter()
            .map(|&i| self.get(i).map_or(0.0, |lm| lm.visibility.clamp(0.0, 1.0)))
            .sum();
        sum / indices.len() as f32
    }

    /// Fraction of the given indices that are visible
    pub fn visible_fraction(&self, indices: &[usize], threshold: f32) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        let visible = indices
            .iter()
            .filter(|&&i| self.visible(i, threshold).is_some())
            .count();
        visible as f32 / indices.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_json_defaults() {
        let lm: Landmark = serde_json::from_str(r#"{"x": 0.25, "y": 0.75}"#).unwrap();
        assert_eq!(lm.z, 0.0);
        assert_eq!(lm.visibility, 1.0);
    }

    #[test]
    fn test_landmark_index_count() {
        assert_eq!(LandmarkIndex::COUNT, 33);
        assert_eq!(LandmarkIndex::RightFootIndex.index(), 32);
    }

    #[test]
    fn test_landmark_visibility_clamped() {
        let lm = Landmark::new(0.5, 0.5, 0.0, 1.7);
        assert_eq!(lm.visibility, 1.0);
        assert!(lm.is_visible(0.5));
    }

    #[test]
    fn test_nan_landmark_is_not_visible() {
        let lm = Landmark::new(f32::NAN, 0.5, 0.0, 1.0);
        assert!(!lm.is_visible(0.1));
    }

    #[test]
    fn test_missing_index_reads_invisible() {
        let pose = Pose::new(vec![Landmark::new(0.5, 0.5, 0.0, 0.9)]);
        assert!(pose.visible(0, 0.5).is_some());
        assert!(pose.visible(LandmarkIndex::LeftKnee.index(), 0.5).is_none());
        assert!((pose.mean_visibility(&[0, 25]) - 0.45).abs() < 1e-6);
        assert!((pose.visible_fraction(&[0, 25], 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_midpoint() {
        let a = Landmark::new(0.0, 0.0, 0.0, 0.8);
        let b = Landmark::new(1.0, 2.0, 0.0, 0.6);
        let m = a.midpoint(&b);
        assert_eq!(m.x, 0.5);
        assert_eq!(m.y, 1.0);
        assert_eq!(m.visibility, 0.6);
    }
}
