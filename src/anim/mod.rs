//! Keyframe animation.
//!
//! - [`timeline`]: per-vertex keyframes, pose snapshots and interpolated
//!   playback
//! - [`ingest`]: baking externally generated per-frame displacements into
//!   keyframes, and describing handles for the generator

pub mod ingest;
pub mod timeline;

pub use ingest::{bake_animation, control_points, role_from_label, AnimationFrame, BakeReport, ControlPoint};
pub use timeline::{
    apply_pose, clear_keyframes, keyframe_times, pose_at, save_pose, time_range, Keyframes,
};
