use anyhow::Result;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use motion_kernel::ingest::{SceneConfig, SyntheticSource};
use motion_kernel::track::DiscardReason;
use motion_kernel::{
    ArchiveSettings, CycleOutcome, CycleOutput, DirectorySink, FrameSource, LifecycleAnalyzer,
    LifecycleThresholds, MotionPipeline, MotionSettings, ObjectId, Prediction, PreprocessSettings,
    RecognitionAdapter, RecognitionService, RunLimits, SnapshotArchive, TrackerSettings, View,
};
use motion_kernel::recognize::{Concept, STATUS_SUCCESS};
use motion_kernel::render::{CONFIRMED_COLOR, TEXT_COLOR};
use motion_kernel::MotiondConfig;

const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

struct CountingRecognizer {
    calls: Arc<AtomicUsize>,
}

impl RecognitionService for CountingRecognizer {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn predict(&mut self, _image: &RgbImage) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Prediction {
            status_code: STATUS_SUCCESS,
            status_description: "Ok".to_string(),
            concepts: ["parcel", "box"]
                .iter()
                .map(|name| Concept {
                    name: name.to_string(),
                    confidence: 0.9,
                })
                .collect(),
        })
    }
}

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn frame(blocks: &[(u32, u32, u32, u32)]) -> RgbImage {
    let mut img = RgbImage::from_pixel(500, 300, BACKGROUND);
    for &(x0, y0, w, h) in blocks {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgb([230, 220, 210]));
            }
        }
    }
    img
}

fn counting_pipeline(archive_dir: &std::path::Path, calls: &Arc<AtomicUsize>) -> Result<MotionPipeline> {
    let adapter = RecognitionAdapter::new(Box::new(CountingRecognizer {
        calls: Arc::clone(calls),
    }));
    let archive = SnapshotArchive::new(ArchiveSettings {
        path: archive_dir.to_path_buf(),
    })?;
    let analyzer = LifecycleAnalyzer::new(LifecycleThresholds::default())?
        .with_recognition(adapter, archive);
    MotionPipeline::new(
        PreprocessSettings::default(),
        MotionSettings::default(),
        TrackerSettings::default(),
        analyzer,
    )
}

fn count_color(image: &RgbImage, color: Rgb<u8>, rows: std::ops::Range<u32>) -> usize {
    rows.flat_map(|y| (0..image.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| *image.get_pixel(x, y) == color)
        .count()
}

fn processed(outcome: CycleOutcome) -> Box<CycleOutput> {
    match outcome {
        CycleOutcome::Processed(output) => output,
        CycleOutcome::Baseline => panic!("unexpected baseline cycle"),
        CycleOutcome::Skipped { reason } => panic!("unexpected skip: {}", reason),
    }
}

#[test]
fn parcel_is_confirmed_once_and_passer_by_is_dropped() -> Result<()> {
    let archive_dir = tempfile::tempdir()?;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = counting_pipeline(archive_dir.path(), &calls)?;

    let parcel = (200, 100, 80, 60);
    let passer_by = (30, 200, 40, 40);

    assert!(matches!(
        pipeline.run_cycle(&frame(&[]), at(0))?,
        CycleOutcome::Baseline
    ));

    for t in 1..=13 {
        let blocks: Vec<_> = if (2..=3).contains(&t) {
            vec![parcel, passer_by]
        } else {
            vec![parcel]
        };
        let output = processed(pipeline.run_cycle(&frame(&blocks), at(t))?);

        match t {
            9 => assert_eq!(
                output.report.removed,
                vec![(ObjectId(2), DiscardReason::Ephemeral)]
            ),
            12 => {
                assert_eq!(output.report.newly_confirmed, vec![ObjectId(1)]);
                assert_eq!(output.report.displayed, vec![ObjectId(1)]);
            }
            13 => {
                assert!(output.report.newly_confirmed.is_empty());
                assert_eq!(output.report.displayed, vec![ObjectId(1)]);
            }
            _ => assert!(output.report.newly_confirmed.is_empty()),
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.tracker().len(), 1);
    let parcel_obj = pipeline
        .tracker()
        .get(ObjectId(1))
        .expect("parcel still tracked");
    assert_eq!(parcel_obj.labels(), ["parcel", "box"]);
    assert!(parcel_obj.reference_image().is_some());
    assert!(archive_dir.path().join("object_found_1.jpg").exists());

    // Gone for more than twice its 12s lifetime.
    let output = processed(pipeline.run_cycle(&frame(&[]), at(37))?);
    assert!(output.report.removed.is_empty());
    let output = processed(pipeline.run_cycle(&frame(&[]), at(38))?);
    assert_eq!(
        output.report.removed,
        vec![(ObjectId(1), DiscardReason::Stale)]
    );
    assert!(pipeline.tracker().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn reference_frame_is_never_replaced() -> Result<()> {
    let mut pipeline = MotionPipeline::with_defaults()?;
    pipeline.run_cycle(&frame(&[]), at(0))?;
    let reference = pipeline.reference().cloned();
    for t in 1..5 {
        pipeline.run_cycle(&frame(&[(100, 100, 50, 50)]), at(t))?;
    }
    assert_eq!(pipeline.reference().cloned(), reference);
    Ok(())
}

#[test]
fn run_writes_every_view_for_synthetic_scene() -> Result<()> {
    let out_dir = tempfile::tempdir()?;
    let mut sink = DirectorySink::new(out_dir.path())?;
    let mut source = SyntheticSource::new(SceneConfig::default());
    source.connect()?;

    let mut pipeline = MotionPipeline::with_defaults()?;
    let stop = AtomicBool::new(false);
    let summary = pipeline.run(
        &mut source,
        &mut sink,
        &stop,
        &RunLimits {
            max_cycles: Some(25),
            target_fps: 0,
        },
    )?;

    assert_eq!(summary.cycles, 25);
    assert_eq!(summary.skipped, 0);
    assert_eq!(sink.cycles(), 24);
    for view in View::ALL {
        assert!(sink.path_for(view).exists(), "missing view {}", view.name());
    }
    // The scripted parcel enters at frame 20.
    assert_eq!(pipeline.tracker().len(), 1);
    Ok(())
}

#[test]
fn archive_failure_stops_the_cycle_without_recognition() -> Result<()> {
    let root = tempfile::tempdir()?;
    let archive_dir = root.path().join("objects");
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = counting_pipeline(&archive_dir, &calls)?;

    let parcel = (200, 100, 80, 60);
    pipeline.run_cycle(&frame(&[]), at(0))?;
    for t in 1..=11 {
        pipeline.run_cycle(&frame(&[parcel]), at(t))?;
    }

    std::fs::remove_dir_all(&archive_dir)?;
    let err = pipeline
        .run_cycle(&frame(&[parcel]), at(12))
        .expect_err("archive write should fail");
    assert!(format!("{:#}", err).contains("object_found_1.jpg"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let parcel_obj = pipeline.tracker().get(ObjectId(1)).expect("parcel still tracked");
    assert!(parcel_obj.reference_image().is_some());
    assert!(parcel_obj.labels().is_empty());

    // The snapshot is taken once; later cycles neither retry the archive nor recognize.
    let output = processed(pipeline.run_cycle(&frame(&[parcel]), at(13))?);
    assert!(output.report.newly_confirmed.is_empty());
    assert_eq!(output.report.displayed, vec![ObjectId(1)]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn default_config_draws_caption_and_labels() -> Result<()> {
    let archive_dir = tempfile::tempdir()?;
    let mut cfg = MotiondConfig::default();
    cfg.archive.path = archive_dir.path().to_path_buf();
    cfg.recognition.enabled = true;
    cfg.recognition.api_url = "stub://labels".to_string();
    assert!(cfg.display.font_path.is_none());
    let mut pipeline = MotionPipeline::from_config(&cfg)?;

    let parcel = (200, 100, 80, 60);
    pipeline.run_cycle(&frame(&[]), at(0))?;
    for t in 1..12 {
        pipeline.run_cycle(&frame(&[parcel]), at(t))?;
    }
    let output = processed(pipeline.run_cycle(&frame(&[parcel]), at(12))?);
    assert_eq!(output.report.newly_confirmed, vec![ObjectId(1)]);

    let parcel_obj = pipeline.tracker().get(ObjectId(1)).expect("parcel still tracked");
    assert!(!parcel_obj.labels().is_empty());

    // The caption sits in the rows directly above the object box.
    let top = parcel_obj.bbox.y;
    let caption_pixels = count_color(&output.frame, CONFIRMED_COLOR, top.saturating_sub(22)..top);
    assert!(caption_pixels > 0, "no caption drawn on display frame");

    let summary = &output.report.summary;
    assert!(count_color(summary, TEXT_COLOR, 0..30) > 0, "no id header on summary");
    let labels_top = 30 + parcel_obj.reference_image().map_or(0, |s| s.height());
    let label_pixels = count_color(summary, TEXT_COLOR, labels_top..summary.height());
    assert!(label_pixels > 0, "no labels drawn on summary");
    Ok(())
}
