use anyhow::Result;

use super::landmark::Pose;

/// Turns one captured frame into landmarks
///
/// This is the expensive step of the pipeline (model inference). The engine
/// calls it at most once at a time.
pub trait PoseSource: Send + Sync {
    type Frame: Send;

    fn evaluate(&self, frame: &Self::Frame) -> Result<Pose>;
}

/// Source for hosts that already run pose estimation upstream and submit
/// landmarks directly
#[derive(Debug, Clone, Copy, Default)]
pub struct LandmarkPassthrough;

impl PoseSource for LandmarkPassthrough {
    type Frame = Pose;

    fn evaluate(&self, frame: &Pose) -> Result<Pose> {
        Ok(frame.clone())
    }
}
