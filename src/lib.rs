//! Real-time exercise form analysis from streamed pose landmarks.
//!
//! Frames go through [`engine::AnalysisEngine`]: admission control, the
//! pose source, a pose-similarity result cache, phase/rep tracking and form
//! scoring, with results aggregated per session.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod pose;
pub mod scoring;
pub mod session;
pub mod tracker;

pub use config::Config;
pub use engine::{AnalysisEngine, PerformanceStats};
pub use error::{EngineError, EngineResult};
pub use pose::{Landmark, LandmarkPassthrough, Pose, PoseSource};
pub use session::{FrameAnalysisResponse, FrameResult, SessionId, SessionSummary};

/// Build version (`git describe`)
pub const GIT_VERSION: &str = env!("GIT_VERSION");
