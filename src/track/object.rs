use image::RgbImage;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::detect::BoundingBox;

/// Stable identifier of a tracked object. Assigned in increasing order and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One moving region followed across cycles.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    id: ObjectId,
    /// Most recent matching box, in work-frame coordinates.
    pub bbox: BoundingBox,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    reference_image: Option<RgbImage>,
    labels: Vec<String>,
}

impl TrackedObject {
    pub(crate) fn new(id: ObjectId, bbox: BoundingBox, now: SystemTime) -> Self {
        Self {
            id,
            bbox,
            first_seen: now,
            last_seen: now,
            reference_image: None,
            labels: Vec::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn reference_image(&self) -> Option<&RgbImage> {
        self.reference_image.as_ref()
    }

    pub fn is_confirmed(&self) -> bool {
        self.reference_image.is_some()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Store the first-confirmation snapshot. Later calls are ignored.
    ///
    /// Returns `true` only for the call that actually stored the image.
    pub fn set_reference_image(&mut self, image: RgbImage) -> bool {
        if self.reference_image.is_some() {
            return false;
        }
        self.reference_image = Some(image);
        true
    }

    /// Append labels, never holding more than `limit` in total.
    pub fn push_labels<I>(&mut self, labels: I, limit: usize)
    where
        I: IntoIterator<Item = String>,
    {
        let room = limit.saturating_sub(self.labels.len());
        self.labels.extend(labels.into_iter().take(room));
    }

    pub(crate) fn observe(&mut self, bbox: BoundingBox, now: SystemTime) {
        self.bbox = bbox;
        self.last_seen = now;
    }

    /// Time between the first and the latest observation.
    pub fn seen(&self) -> Duration {
        elapsed(self.first_seen, self.last_seen)
    }

    pub fn since_first_seen(&self, now: SystemTime) -> Duration {
        elapsed(self.first_seen, now)
    }

    pub fn since_last_seen(&self, now: SystemTime) -> Duration {
        elapsed(self.last_seen, now)
    }
}

/// `to - from`, or zero when the clock went backwards.
fn elapsed(from: SystemTime, to: SystemTime) -> Duration {
    to.duration_since(from).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn reference_image_is_set_once() {
        let mut obj = TrackedObject::new(ObjectId(1), BoundingBox::new(0, 0, 4, 4), at(0));
        assert!(obj.set_reference_image(RgbImage::new(4, 4)));
        assert!(!obj.set_reference_image(RgbImage::new(8, 8)));
        assert_eq!(obj.reference_image().unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn labels_are_capped() {
        let mut obj = TrackedObject::new(ObjectId(1), BoundingBox::new(0, 0, 4, 4), at(0));
        obj.push_labels((0..8).map(|i| format!("label{i}")), 5);
        assert_eq!(obj.labels().len(), 5);
        assert_eq!(obj.labels()[0], "label0");
    }

    #[test]
    fn clock_going_backwards_reads_as_zero() {
        let obj = TrackedObject::new(ObjectId(1), BoundingBox::new(0, 0, 4, 4), at(10));
        assert_eq!(obj.since_last_seen(at(5)), Duration::ZERO);
        assert_eq!(obj.since_first_seen(at(13)), Duration::from_secs(3));
    }
}
