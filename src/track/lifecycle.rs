//! Lifecycle classification of tracked objects.
//!
//! Every cycle each object is classified from three whole-second ages:
//!
//! - `seen`: last observation minus first observation
//! - `since_first`: now minus first observation
//! - `since_last`: now minus last observation
//!
//! Objects that vanish soon after a brief appearance are dropped as ephemeral.
//! Objects that were around long enough but have been gone for more than
//! `hidden_factor` times their observed lifetime are dropped as stale. The rest
//! of the long-lived objects are confirmed: the first time, their snapshot is
//! taken and (optionally) sent to recognition; every time, they are drawn on
//! the display frame and the summary composite.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};
use std::time::SystemTime;

use super::object::{ObjectId, TrackedObject};
use super::tracker::ObjectTracker;
use crate::archive::SnapshotArchive;
use crate::recognize::{RecognitionAdapter, RecognitionOutcome};
use crate::render::{object_caption, Painter, SummaryCanvas, CONFIRMED_COLOR};

pub const DEFAULT_YOUNG_MIN_SECS: u64 = 5;
pub const DEFAULT_YOUNG_MAX_SECS: u64 = 10;
pub const DEFAULT_HIDDEN_FACTOR: u64 = 2;

#[derive(Clone, Debug)]
pub struct LifecycleThresholds {
    /// An object absent longer than this, with a short observed lifetime, is ephemeral.
    pub young_min_secs: u64,
    /// Observed lifetime above which an object can be confirmed.
    pub young_max_secs: u64,
    /// Absence allowance as a multiple of the observed lifetime.
    pub hidden_factor: u64,
}

impl Default for LifecycleThresholds {
    fn default() -> Self {
        Self {
            young_min_secs: DEFAULT_YOUNG_MIN_SECS,
            young_max_secs: DEFAULT_YOUNG_MAX_SECS,
            hidden_factor: DEFAULT_HIDDEN_FACTOR,
        }
    }
}

impl LifecycleThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.young_min_secs > self.young_max_secs {
            return Err(anyhow!(
                "young_min_secs ({}) must not exceed young_max_secs ({})",
                self.young_min_secs,
                self.young_max_secs
            ));
        }
        Ok(())
    }

    /// Classify one object at `now`.
    pub fn classify(&self, object: &TrackedObject, now: SystemTime) -> Verdict {
        let ages = Ages::of(object, now);
        if ages.since_last > self.young_min_secs && ages.seen <= self.young_max_secs {
            return Verdict::Ephemeral;
        }
        if ages.seen > self.young_max_secs {
            if ages.since_last > self.hidden_factor.saturating_mul(ages.seen) {
                return Verdict::Stale;
            }
            return Verdict::Confirmed;
        }
        Verdict::Pending
    }
}

/// Whole-second ages of an object, fractions truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ages {
    pub seen: u64,
    pub since_first: u64,
    pub since_last: u64,
}

impl Ages {
    pub fn of(object: &TrackedObject, now: SystemTime) -> Self {
        Self {
            seen: object.seen().as_secs(),
            since_first: object.since_first_seen(now).as_secs(),
            since_last: object.since_last_seen(now).as_secs(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Too young to judge; keep watching.
    Pending,
    /// Vanished quickly after a brief appearance.
    Ephemeral,
    /// Long-lived but gone for disproportionately long.
    Stale,
    /// Long-lived and still plausibly present.
    Confirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    Ephemeral,
    Stale,
}

/// Everything one analysis pass decided.
#[derive(Debug)]
pub struct LifecycleReport {
    pub removed: Vec<(ObjectId, DiscardReason)>,
    /// Objects whose snapshot was taken during this pass.
    pub newly_confirmed: Vec<ObjectId>,
    /// Confirmed objects drawn this pass, in id order.
    pub displayed: Vec<ObjectId>,
    pub recognitions: Vec<(ObjectId, RecognitionOutcome)>,
    /// Fresh summary composite for this cycle.
    pub summary: RgbImage,
}

pub struct LifecycleAnalyzer {
    thresholds: LifecycleThresholds,
    recognition: Option<RecognitionAdapter>,
    archive: Option<SnapshotArchive>,
    painter: Painter,
}

impl LifecycleAnalyzer {
    pub fn new(thresholds: LifecycleThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            recognition: None,
            archive: None,
            painter: Painter::bitmap(),
        })
    }

    /// Enable recognition. Snapshots are archived to `archive` before each call.
    pub fn with_recognition(mut self, adapter: RecognitionAdapter, archive: SnapshotArchive) -> Self {
        self.recognition = Some(adapter);
        self.archive = Some(archive);
        self
    }

    pub fn with_painter(mut self, painter: Painter) -> Self {
        self.painter = painter;
        self
    }

    pub fn thresholds(&self) -> &LifecycleThresholds {
        &self.thresholds
    }

    pub fn recognition_enabled(&self) -> bool {
        self.recognition.is_some()
    }

    /// Run one pass over every tracked object.
    ///
    /// `raw` is the unannotated scaled frame used for snapshots; `display` is
    /// the frame that receives boxes and captions. Removals are applied after
    /// the scan. An archive write failure aborts the pass with an error.
    pub fn analyze(
        &mut self,
        tracker: &mut ObjectTracker,
        raw: &RgbImage,
        display: &mut RgbImage,
        now: SystemTime,
    ) -> Result<LifecycleReport> {
        let mut removed = Vec::new();
        let mut newly_confirmed = Vec::new();
        let mut displayed = Vec::new();
        let mut recognitions = Vec::new();
        let mut summary = SummaryCanvas::new();

        for object in tracker.objects_mut() {
            let id = object.id();
            let ages = Ages::of(object, now);
            match self.thresholds.classify(object, now) {
                Verdict::Pending => {}
                Verdict::Ephemeral => {
                    log::info!(
                        "object {} discarded: vanished after {}s (gone {}s)",
                        id,
                        ages.seen,
                        ages.since_last
                    );
                    removed.push((id, DiscardReason::Ephemeral));
                }
                Verdict::Stale => {
                    log::info!(
                        "object {} discarded: seen {}s, lost for {}s",
                        id,
                        ages.seen,
                        ages.since_last
                    );
                    removed.push((id, DiscardReason::Stale));
                }
                Verdict::Confirmed => {
                    if !object.is_confirmed() {
                        if let Some(outcome) = self.confirm(object, raw)? {
                            recognitions.push((id, outcome));
                        }
                        if object.is_confirmed() {
                            newly_confirmed.push(id);
                        }
                    }

                    if let Some(snapshot) = object.reference_image() {
                        summary.place(
                            &self.painter,
                            id,
                            snapshot,
                            object.labels(),
                            object.bbox.width,
                        );
                    }
                    self.painter.draw_box(display, &object.bbox, CONFIRMED_COLOR);
                    self.painter.draw_caption(
                        display,
                        object.bbox.x as i32,
                        object.bbox.y as i32,
                        &object_caption(id, ages.seen, ages.since_last),
                        CONFIRMED_COLOR,
                    );
                    displayed.push(id);
                }
            }
        }

        for (id, _) in &removed {
            tracker.remove(*id);
        }

        Ok(LifecycleReport {
            removed,
            newly_confirmed,
            displayed,
            recognitions,
            summary: summary.into_image(),
        })
    }

    /// Take the one-time snapshot and, when enabled, run recognition on it.
    fn confirm(
        &mut self,
        object: &mut TrackedObject,
        raw: &RgbImage,
    ) -> Result<Option<RecognitionOutcome>> {
        let id = object.id();
        let Some(region) = object.bbox.clamp_to(raw.width(), raw.height()) else {
            log::warn!("object {} box {} lies outside the frame; snapshot deferred", id, object.bbox);
            return Ok(None);
        };
        let snapshot =
            imageops::crop_imm(raw, region.x, region.y, region.width, region.height).to_image();
        object.set_reference_image(snapshot);
        log::info!("object {} confirmed at {}", id, object.bbox);

        let (Some(adapter), Some(archive)) = (self.recognition.as_mut(), self.archive.as_ref())
        else {
            return Ok(None);
        };
        let Some(snapshot) = object.reference_image().cloned() else {
            return Ok(None);
        };
        archive.store(id, &snapshot)?;
        log::info!("object {} submitted to {}", id, adapter.service_name());
        Ok(Some(adapter.recognize(object, &snapshot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::track::TrackerSettings;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn tracked(first: u64, last: u64) -> ObjectTracker {
        let mut tracker = ObjectTracker::new(TrackerSettings::default());
        let bbox = BoundingBox::new(10, 10, 20, 20);
        tracker.update(&[bbox], at(first));
        tracker.update(&[bbox], at(last));
        tracker
    }

    fn verdict(first: u64, last: u64, now: u64) -> Verdict {
        let tracker = tracked(first, last);
        let obj = tracker.objects().next().unwrap();
        LifecycleThresholds::default().classify(obj, at(now))
    }

    #[test]
    fn brief_then_gone_is_ephemeral() {
        // seen 3s, gone 9s
        assert_eq!(verdict(0, 3, 12), Verdict::Ephemeral);
    }

    #[test]
    fn brief_and_recent_is_pending() {
        assert_eq!(verdict(0, 3, 8), Verdict::Pending);
        assert_eq!(verdict(0, 10, 15), Verdict::Pending);
    }

    #[test]
    fn long_lived_is_confirmed() {
        assert_eq!(verdict(0, 15, 15), Verdict::Confirmed);
        // Gone exactly twice its lifetime is still tolerated.
        assert_eq!(verdict(0, 20, 60), Verdict::Confirmed);
    }

    #[test]
    fn long_gone_is_stale() {
        // seen 20s, gone 45s > 2 * 20s
        assert_eq!(verdict(0, 20, 65), Verdict::Stale);
    }

    #[test]
    fn zero_hidden_factor_drops_as_soon_as_unseen() -> Result<()> {
        let thresholds = LifecycleThresholds {
            hidden_factor: 0,
            ..LifecycleThresholds::default()
        };
        LifecycleAnalyzer::new(thresholds.clone())?;
        let tracker = tracked(0, 12);
        let obj = tracker.objects().next().unwrap();
        assert_eq!(thresholds.classify(obj, at(12)), Verdict::Confirmed);
        assert_eq!(thresholds.classify(obj, at(13)), Verdict::Stale);
        Ok(())
    }

    #[test]
    fn fractional_seconds_are_truncated() {
        let mut tracker = ObjectTracker::new(TrackerSettings::default());
        let bbox = BoundingBox::new(10, 10, 20, 20);
        tracker.update(&[bbox], at(0));
        tracker.update(&[bbox], at(10) + Duration::from_millis(900));
        let obj = tracker.objects().next().unwrap();
        // 10.9s of observed lifetime reads as 10s: not yet long-lived.
        assert_eq!(
            LifecycleThresholds::default().classify(obj, at(11)),
            Verdict::Pending
        );
    }

    #[test]
    fn analyze_removes_after_scan_and_confirms_once() -> Result<()> {
        let mut tracker = ObjectTracker::new(TrackerSettings::default());
        let keep = BoundingBox::new(10, 10, 20, 20);
        let drop = BoundingBox::new(100, 10, 20, 20);
        tracker.update(&[keep, drop], at(0));
        tracker.update(&[keep], at(15));

        let mut analyzer = LifecycleAnalyzer::new(LifecycleThresholds::default())?;
        let raw = RgbImage::from_pixel(200, 100, image::Rgb([50, 60, 70]));
        let mut display = raw.clone();

        let report = analyzer.analyze(&mut tracker, &raw, &mut display, at(15))?;
        assert_eq!(report.removed, vec![(ObjectId(2), DiscardReason::Ephemeral)]);
        assert_eq!(report.newly_confirmed, vec![ObjectId(1)]);
        assert_eq!(report.displayed, vec![ObjectId(1)]);
        assert_eq!(tracker.len(), 1);
        let snapshot = tracker.get(ObjectId(1)).unwrap().reference_image().unwrap();
        assert_eq!(snapshot.dimensions(), (20, 20));

        let again = analyzer.analyze(&mut tracker, &raw, &mut display, at(15))?;
        assert!(again.removed.is_empty());
        assert!(again.newly_confirmed.is_empty());
        assert_eq!(again.displayed, vec![ObjectId(1)]);
        Ok(())
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let thresholds = LifecycleThresholds {
            young_min_secs: 12,
            young_max_secs: 10,
            hidden_factor: 2,
        };
        assert!(LifecycleAnalyzer::new(thresholds).is_err());
    }
}
