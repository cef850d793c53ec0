//! Identity matching for detected regions.
//!
//! A detection belongs to an existing object when its box is within the
//! movement tolerance on every coordinate. The scan runs in ascending id order
//! and stops at the first hit; it does not look for the closest object.
//! Each object can absorb at most one detection per cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use super::object::{ObjectId, TrackedObject};
use crate::detect::BoundingBox;

/// Default minimum contour area (pixels) for a region to be tracked.
pub const DEFAULT_MIN_OBJECT_AREA: u32 = 200;

/// Default per-coordinate movement tolerance (pixels).
pub const DEFAULT_MOVEMENT_TOLERANCE: u32 = 10;

#[derive(Clone, Debug)]
pub struct TrackerSettings {
    /// Regions with a smaller contour area are ignored before matching.
    pub min_object_area: u32,
    /// Maximum per-coordinate deviation for two boxes to be the same object.
    pub movement_tolerance: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_object_area: DEFAULT_MIN_OBJECT_AREA,
            movement_tolerance: DEFAULT_MOVEMENT_TOLERANCE,
        }
    }
}

/// What happened to one detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    Matched(ObjectId),
    Created(ObjectId),
}

impl Observation {
    pub fn id(&self) -> ObjectId {
        match self {
            Observation::Matched(id) | Observation::Created(id) => *id,
        }
    }
}

/// Owner of the tracked set. Single writer; not shared across threads.
pub struct ObjectTracker {
    settings: TrackerSettings,
    objects: BTreeMap<ObjectId, TrackedObject>,
    last_id: u64,
}

impl ObjectTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            objects: BTreeMap::new(),
            last_id: 0,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&TrackedObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.values()
    }

    pub(crate) fn objects_mut(&mut self) -> impl Iterator<Item = &mut TrackedObject> {
        self.objects.values_mut()
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<TrackedObject> {
        self.objects.remove(&id)
    }

    /// True when a contour of this area is large enough to be tracked.
    pub fn accepts_area(&self, area: f64) -> bool {
        area >= self.settings.min_object_area as f64
    }

    /// Apply one cycle's detections, in the order given.
    ///
    /// An object matched or created earlier in the same call is not eligible
    /// for later detections, so two detections near one object yield one
    /// update and one new object.
    pub fn update(&mut self, detections: &[BoundingBox], now: SystemTime) -> Vec<Observation> {
        let mut claimed = BTreeSet::new();
        detections
            .iter()
            .map(|bbox| {
                let observation = self.observe(*bbox, now, &claimed);
                claimed.insert(observation.id());
                observation
            })
            .collect()
    }

    fn observe(
        &mut self,
        bbox: BoundingBox,
        now: SystemTime,
        claimed: &BTreeSet<ObjectId>,
    ) -> Observation {
        let tolerance = self.settings.movement_tolerance;
        let hit = self
            .objects
            .values_mut()
            .filter(|obj| !claimed.contains(&obj.id()))
            .find(|obj| obj.bbox.within_tolerance(&bbox, tolerance));

        if let Some(obj) = hit {
            obj.observe(bbox, now);
            return Observation::Matched(obj.id());
        }

        self.last_id += 1;
        let id = ObjectId(self.last_id);
        self.objects.insert(id, TrackedObject::new(id, bbox, now));
        log::debug!("object {} created at {}", id, bbox);
        Observation::Created(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn tracker() -> ObjectTracker {
        ObjectTracker::new(TrackerSettings::default())
    }

    #[test]
    fn box_within_tolerance_updates_existing_object() {
        let mut tracker = tracker();
        let first = tracker.update(&[BoundingBox::new(100, 100, 40, 40)], at(0));
        assert_eq!(first, vec![Observation::Created(ObjectId(1))]);

        let moved = BoundingBox::new(108, 95, 45, 38);
        let second = tracker.update(&[moved], at(3));
        assert_eq!(second, vec![Observation::Matched(ObjectId(1))]);

        let obj = tracker.get(ObjectId(1)).unwrap();
        assert_eq!(obj.bbox, moved);
        assert_eq!(obj.first_seen, at(0));
        assert_eq!(obj.last_seen, at(3));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn box_outside_tolerance_creates_new_object() {
        let mut tracker = tracker();
        tracker.update(&[BoundingBox::new(100, 100, 40, 40)], at(0));
        let obs = tracker.update(&[BoundingBox::new(111, 100, 40, 40)], at(1));
        assert_eq!(obs, vec![Observation::Created(ObjectId(2))]);

        let obj = tracker.get(ObjectId(2)).unwrap();
        assert_eq!(obj.first_seen, at(1));
        assert_eq!(obj.last_seen, at(1));
    }

    #[test]
    fn ids_increase_and_are_not_reused() {
        let mut tracker = tracker();
        tracker.update(&[BoundingBox::new(0, 0, 20, 20)], at(0));
        tracker.update(&[BoundingBox::new(200, 0, 20, 20)], at(0));
        tracker.remove(ObjectId(2));
        let obs = tracker.update(&[BoundingBox::new(200, 0, 20, 20)], at(1));
        assert_eq!(obs, vec![Observation::Created(ObjectId(3))]);
    }

    #[test]
    fn first_match_wins_in_id_order() {
        let mut tracker = tracker();
        tracker.update(
            &[
                BoundingBox::new(100, 100, 40, 40),
                BoundingBox::new(115, 100, 40, 40),
            ],
            at(0),
        );
        // Within tolerance of both objects; the lower id gets it.
        let obs = tracker.update(&[BoundingBox::new(108, 100, 40, 40)], at(1));
        assert_eq!(obs, vec![Observation::Matched(ObjectId(1))]);
        assert_eq!(tracker.get(ObjectId(2)).unwrap().last_seen, at(0));
    }

    #[test]
    fn two_detections_near_one_object_spawn_a_second_object() {
        let mut tracker = tracker();
        tracker.update(&[BoundingBox::new(100, 100, 40, 40)], at(0));

        let a = BoundingBox::new(102, 100, 40, 40);
        let b = BoundingBox::new(98, 101, 40, 40);
        let obs = tracker.update(&[a, b], at(2));
        assert_eq!(
            obs,
            vec![
                Observation::Matched(ObjectId(1)),
                Observation::Created(ObjectId(2))
            ]
        );
        assert_eq!(tracker.get(ObjectId(1)).unwrap().bbox, a);
        assert_eq!(tracker.get(ObjectId(2)).unwrap().bbox, b);

        // Same input order on a fresh tracker gives the same outcome.
        let mut replay = ObjectTracker::new(TrackerSettings::default());
        replay.update(&[BoundingBox::new(100, 100, 40, 40)], at(0));
        assert_eq!(replay.update(&[a, b], at(2)), obs);
    }

    #[test]
    fn area_filter_uses_minimum_inclusive() {
        let tracker = tracker();
        assert!(!tracker.accepts_area(199.5));
        assert!(tracker.accepts_area(200.0));
    }
}
