//! Motion detection primitives.
//!
//! - `bbox`: pixel-space bounding boxes and the tolerance test used for matching
//! - `motion`: static-reference frame differencing and contour extraction

pub mod bbox;
pub mod motion;

pub use bbox::BoundingBox;
pub use motion::{
    MotionExtractor, MotionLayers, MotionOutcome, MotionRegion, MotionSettings,
    DEFAULT_DILATE_ITERATIONS, DEFAULT_THRESHOLD,
};
