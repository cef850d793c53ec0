//! Motion Kernel
//!
//! Watches a frame stream for things that move, follows them as persistent
//! objects and decides when an object is worth a snapshot.
//!
//! # Architecture
//!
//! Every cycle flows through the same stages, leaves first:
//!
//! 1. **Preprocess** (`frame`): scale to a fixed working width, grayscale, blur.
//! 2. **Extract** (`detect`): difference against a static reference frame,
//!    threshold, dilate, take external contours.
//! 3. **Track** (`track::tracker`): match boxes to known objects by per-coordinate
//!    tolerance, first match wins.
//! 4. **Analyze** (`track::lifecycle`): drop ephemeral and stale objects, confirm
//!    long-lived ones, snapshot them once and optionally recognize them.
//! 5. **Present** (`present`): hand the annotated frame, the diagnostic layers
//!    and the summary composite to a sink.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (synthetic scene, image files, V4L2)
//! - `recognize`: recognition capability, adapter, stub and Clarifai services
//! - `archive`: per-object snapshot files
//! - `render`: boxes, captions, summary composite
//! - `pipeline`: the cycle and the run loop
//! - `config`: file and environment configuration

pub mod archive;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod present;
pub mod recognize;
pub mod render;
pub mod track;

pub use archive::{ArchiveSettings, SnapshotArchive};
pub use config::MotiondConfig;
pub use detect::{BoundingBox, MotionExtractor, MotionOutcome, MotionSettings};
pub use frame::{FramePreprocessor, PreparedFrame, PreprocessSettings};
pub use ingest::{open_source, FrameSource, SourceConfig, SourceStats};
pub use pipeline::{CycleOutcome, CycleOutput, MotionPipeline, RunLimits, RunSummary};
pub use present::{DirectorySink, DisplaySink, NullSink, View};
pub use recognize::{
    Concept, Prediction, RecognitionAdapter, RecognitionOutcome, RecognitionService,
    RecognitionSettings, StubRecognizer,
};
pub use render::Painter;
pub use track::{
    DiscardReason, LifecycleAnalyzer, LifecycleReport, LifecycleThresholds, ObjectId,
    ObjectTracker, Observation, TrackedObject, TrackerSettings,
};
