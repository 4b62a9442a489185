pub mod feedback;
pub mod scorer;

pub use feedback::{Aspect, AspectScores, FeedbackItem, FeedbackKind};
pub use scorer::{is_trackable, pose_confidence, FormScorer, FrameScore};
