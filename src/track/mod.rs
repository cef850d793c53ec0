//! Object identity and lifecycle.
//!
//! - `tracker`: associates detections with persistent objects
//! - `lifecycle`: discards, confirms and annotates objects over time
//! - `object`: the per-object record both of them work on

pub mod lifecycle;
pub mod object;
pub mod tracker;

pub use lifecycle::{
    Ages, DiscardReason, LifecycleAnalyzer, LifecycleReport, LifecycleThresholds, Verdict,
    DEFAULT_HIDDEN_FACTOR, DEFAULT_YOUNG_MAX_SECS, DEFAULT_YOUNG_MIN_SECS,
};
pub use object::{ObjectId, TrackedObject};
pub use tracker::{
    ObjectTracker, Observation, TrackerSettings, DEFAULT_MIN_OBJECT_AREA,
    DEFAULT_MOVEMENT_TOLERANCE,
};
