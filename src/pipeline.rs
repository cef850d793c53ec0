//! Detection and tracking cycle.
//!
//! One cycle runs to completion before the next starts:
//!
//! 1. Preprocess the frame (scale, grayscale, blur)
//! 2. Difference against the static reference and extract regions
//! 3. Drop small regions and match the rest against tracked objects
//! 4. Classify every tracked object and annotate confirmed ones
//! 5. Hand every view to the display sink
//!
//! Unreadable frames and frames that do not fit the reference only skip the
//! cycle. Archive and sink errors stop the run.

use anyhow::Result;
use image::{DynamicImage, GrayImage, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::archive::SnapshotArchive;
use crate::config::MotiondConfig;
use crate::detect::{BoundingBox, MotionExtractor, MotionOutcome, MotionSettings};
use crate::frame::{FramePreprocessor, PreprocessSettings};
use crate::ingest::FrameSource;
use crate::present::{DisplaySink, View};
use crate::render::{Painter, DETECTION_COLOR};
use crate::track::{
    LifecycleAnalyzer, LifecycleReport, LifecycleThresholds, ObjectTracker, Observation,
    TrackerSettings,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Images and decisions produced by one processed cycle.
#[derive(Debug)]
pub struct CycleOutput {
    /// Scaled colour frame with detection and object overlays.
    pub frame: RgbImage,
    pub gray: GrayImage,
    pub gray_blurred: GrayImage,
    pub delta: GrayImage,
    pub threshold: GrayImage,
    pub dilated: GrayImage,
    pub reference: GrayImage,
    /// Regions that passed the area filter, in extraction order.
    pub detections: Vec<BoundingBox>,
    pub observations: Vec<Observation>,
    pub report: LifecycleReport,
}

impl CycleOutput {
    pub fn present(&self, sink: &mut dyn DisplaySink) -> Result<()> {
        for view in View::ALL {
            let image = match view {
                View::Frame => DynamicImage::ImageRgb8(self.frame.clone()),
                View::Gray => DynamicImage::ImageLuma8(self.gray.clone()),
                View::GrayBlurred => DynamicImage::ImageLuma8(self.gray_blurred.clone()),
                View::Delta => DynamicImage::ImageLuma8(self.delta.clone()),
                View::Threshold => DynamicImage::ImageLuma8(self.threshold.clone()),
                View::Dilated => DynamicImage::ImageLuma8(self.dilated.clone()),
                View::Reference => DynamicImage::ImageLuma8(self.reference.clone()),
                View::FoundObjects => DynamicImage::ImageRgb8(self.report.summary.clone()),
            };
            sink.show(view, &image)?;
        }
        sink.end_cycle()
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// The frame could not be used; nothing changed.
    Skipped { reason: String },
    /// The frame became the reference.
    Baseline,
    Processed(Box<CycleOutput>),
}

/// Bounds for `MotionPipeline::run`.
#[derive(Clone, Debug)]
pub struct RunLimits {
    /// Stop after this many cycles, skipped ones included.
    pub max_cycles: Option<u64>,
    /// Cycle pacing. Zero runs as fast as the source allows.
    pub target_fps: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_cycles: None,
            target_fps: crate::ingest::DEFAULT_TARGET_FPS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub skipped: u64,
    pub confirmed: u64,
    pub discarded: u64,
}

pub struct MotionPipeline {
    preprocessor: FramePreprocessor,
    extractor: MotionExtractor,
    tracker: ObjectTracker,
    analyzer: LifecycleAnalyzer,
    painter: Painter,
}

impl MotionPipeline {
    pub fn new(
        preprocess: PreprocessSettings,
        motion: MotionSettings,
        tracker: TrackerSettings,
        analyzer: LifecycleAnalyzer,
    ) -> Result<Self> {
        Ok(Self {
            preprocessor: FramePreprocessor::new(preprocess)?,
            extractor: MotionExtractor::new(motion),
            tracker: ObjectTracker::new(tracker),
            analyzer,
            painter: Painter::bitmap(),
        })
    }

    /// Pipeline with default settings, no recognition and the bitmap font.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            PreprocessSettings::default(),
            MotionSettings::default(),
            TrackerSettings::default(),
            LifecycleAnalyzer::new(LifecycleThresholds::default())?,
        )
    }

    pub fn from_config(cfg: &MotiondConfig) -> Result<Self> {
        cfg.validate()?;
        let painter = Painter::load(cfg.display.font_path.as_deref())?;
        let mut analyzer =
            LifecycleAnalyzer::new(cfg.lifecycle.clone())?.with_painter(painter.clone());
        if let Some(adapter) = cfg.recognition.build_adapter()? {
            let archive = SnapshotArchive::new(cfg.archive.clone())?;
            log::info!(
                "recognition via {} enabled; snapshots archived in {}",
                adapter.service_name(),
                archive.root().display()
            );
            analyzer = analyzer.with_recognition(adapter, archive);
        }
        let mut pipeline = Self::new(
            cfg.preprocess.clone(),
            cfg.motion.clone(),
            cfg.tracker.clone(),
            analyzer,
        )?;
        pipeline.painter = painter;
        Ok(pipeline)
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.extractor.reference()
    }

    /// Run one cycle on `frame` at wall-clock time `now`.
    pub fn run_cycle(&mut self, frame: &RgbImage, now: SystemTime) -> Result<CycleOutcome> {
        let prepared = match self.preprocessor.prepare(frame) {
            Ok(prepared) => prepared,
            Err(e) => return Ok(skipped(e)),
        };

        let layers = match self.extractor.extract(&prepared.work) {
            Ok(MotionOutcome::Baseline) => {
                log::info!(
                    "reference frame captured ({}x{})",
                    prepared.width(),
                    prepared.height()
                );
                return Ok(CycleOutcome::Baseline);
            }
            Ok(MotionOutcome::Motion(layers)) => layers,
            Err(e) => return Ok(skipped(e)),
        };

        let mut display = prepared.raw.clone();
        let detections: Vec<BoundingBox> = layers
            .regions
            .iter()
            .filter(|region| self.tracker.accepts_area(region.area))
            .map(|region| region.bbox)
            .collect();
        for bbox in &detections {
            self.painter.draw_box(&mut display, bbox, DETECTION_COLOR);
        }

        let observations = self.tracker.update(&detections, now);
        let report = self
            .analyzer
            .analyze(&mut self.tracker, &prepared.raw, &mut display, now)?;

        let reference = self
            .extractor
            .reference()
            .cloned()
            .unwrap_or_else(|| prepared.work.clone());

        Ok(CycleOutcome::Processed(Box::new(CycleOutput {
            frame: display,
            gray: prepared.gray,
            gray_blurred: prepared.work,
            delta: layers.delta,
            threshold: layers.threshold,
            dilated: layers.dilated,
            reference,
            detections,
            observations,
            report,
        })))
    }

    /// Pull frames from `source` until `stop` is set or the cycle limit is hit.
    ///
    /// The source must already be connected.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn DisplaySink,
        stop: &AtomicBool,
        limits: &RunLimits,
    ) -> Result<RunSummary> {
        let pace = (limits.target_fps > 0)
            .then(|| Duration::from_secs_f64(1.0 / limits.target_fps as f64));
        let mut summary = RunSummary::default();
        let mut last_health_log = Instant::now();

        while !stop.load(Ordering::SeqCst) {
            if limits.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            let started = Instant::now();
            summary.cycles += 1;

            let outcome = match source.next_frame() {
                Ok(frame) => self.run_cycle(&frame, SystemTime::now())?,
                Err(e) => skipped(e),
            };
            match outcome {
                CycleOutcome::Skipped { reason } => {
                    summary.skipped += 1;
                    log::warn!("cycle {} skipped: {}", summary.cycles, reason);
                }
                CycleOutcome::Baseline => {}
                CycleOutcome::Processed(output) => {
                    summary.confirmed += output.report.newly_confirmed.len() as u64;
                    summary.discarded += output.report.removed.len() as u64;
                    output.present(sink)?;
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} frames={} errors={} location={} tracked={} cycles={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.capture_errors,
                    stats.location,
                    self.tracker.len(),
                    summary.cycles
                );
                last_health_log = Instant::now();
            }

            if let Some(pace) = pace {
                if let Some(remaining) = pace.checked_sub(started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        }

        Ok(summary)
    }
}

fn skipped(err: anyhow::Error) -> CycleOutcome {
    CycleOutcome::Skipped {
        reason: format!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::NullSink;
    use image::Rgb;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn scene(with_block: bool) -> RgbImage {
        let mut frame = RgbImage::from_pixel(500, 300, Rgb([40, 40, 40]));
        if with_block {
            for y in 100..160 {
                for x in 200..280 {
                    frame.put_pixel(x, y, Rgb([230, 230, 230]));
                }
            }
        }
        frame
    }

    #[test]
    fn first_frame_only_sets_reference() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        assert!(matches!(
            pipeline.run_cycle(&scene(true), at(0))?,
            CycleOutcome::Baseline
        ));
        assert!(pipeline.reference().is_some());
        assert!(pipeline.tracker().is_empty());
        Ok(())
    }

    #[test]
    fn empty_frame_is_skipped_without_side_effects() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        let outcome = pipeline.run_cycle(&RgbImage::new(0, 0), at(0))?;
        assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
        assert!(pipeline.reference().is_none());
        Ok(())
    }

    #[test]
    fn mismatched_frame_is_skipped() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        pipeline.run_cycle(&scene(false), at(0))?;
        // Same width, different aspect ratio: the working frame has another height.
        let tall = RgbImage::from_pixel(500, 400, Rgb([40, 40, 40]));
        assert!(matches!(
            pipeline.run_cycle(&tall, at(1))?,
            CycleOutcome::Skipped { .. }
        ));
        assert!(pipeline.tracker().is_empty());
        Ok(())
    }

    #[test]
    fn block_is_detected_and_tracked() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        pipeline.run_cycle(&scene(false), at(0))?;
        let CycleOutcome::Processed(output) = pipeline.run_cycle(&scene(true), at(1))? else {
            panic!("expected a processed cycle");
        };
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.observations.len(), 1);
        let bbox = output.detections[0];
        assert!(bbox.x <= 200 && bbox.right() >= 280);
        assert_eq!(*output.frame.get_pixel(bbox.x, bbox.y), DETECTION_COLOR);
        assert_eq!(pipeline.tracker().len(), 1);
        Ok(())
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<RgbImage> {
            Err(anyhow::anyhow!("camera unplugged"))
        }

        fn is_healthy(&self) -> bool {
            false
        }

        fn stats(&self) -> crate::ingest::SourceStats {
            crate::ingest::SourceStats::default()
        }
    }

    #[test]
    fn source_errors_skip_cycles_and_run_continues() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        let stop = AtomicBool::new(false);
        let summary = pipeline.run(
            &mut FailingSource,
            &mut NullSink,
            &stop,
            &RunLimits {
                max_cycles: Some(3),
                target_fps: 0,
            },
        )?;
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.skipped, 3);
        Ok(())
    }

    #[test]
    fn stop_flag_ends_run_before_first_cycle() -> Result<()> {
        let mut pipeline = MotionPipeline::with_defaults()?;
        let stop = AtomicBool::new(true);
        let summary = pipeline.run(&mut FailingSource, &mut NullSink, &stop, &RunLimits::default())?;
        assert_eq!(summary.cycles, 0);
        Ok(())
    }
}
