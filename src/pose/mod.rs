pub mod angle;
pub mod landmark;
pub mod source;

pub use angle::{joint_angle, lean_from_vertical, offset_from_line};
pub use landmark::{Landmark, LandmarkIndex, Pose};
pub use source::{LandmarkPassthrough, PoseSource};
