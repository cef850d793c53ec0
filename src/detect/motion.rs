//! Motion extraction against a static reference frame.
//!
//! The first work frame ever seen becomes the reference and is never replaced.
//! Every later frame goes through:
//!
//! 1. absolute difference against the reference
//! 2. binary threshold
//! 3. dilation, to merge fragmented blobs
//! 4. external contour extraction and bounding rectangles

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::contour_area;
use imageproc::morphology::dilate;

use super::bbox::BoundingBox;

/// Default intensity cutoff for the binary threshold (0..=255).
pub const DEFAULT_THRESHOLD: u8 = 45;

/// Default number of 3x3 dilation passes.
pub const DEFAULT_DILATE_ITERATIONS: u8 = 2;

#[derive(Clone, Debug)]
pub struct MotionSettings {
    /// Pixels whose delta is strictly above this value become foreground.
    pub threshold: u8,
    /// Dilation passes with a 3x3 square element.
    pub dilate_iterations: u8,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
        }
    }
}

/// One connected foreground region.
#[derive(Clone, Debug)]
pub struct MotionRegion {
    pub bbox: BoundingBox,
    /// Polygon area enclosed by the external contour, in pixels.
    pub area: f64,
}

/// Intermediate images and regions produced for one frame.
pub struct MotionLayers {
    pub delta: GrayImage,
    pub threshold: GrayImage,
    pub dilated: GrayImage,
    pub regions: Vec<MotionRegion>,
}

pub enum MotionOutcome {
    /// The frame was adopted as the reference. Nothing to report this cycle.
    Baseline,
    Motion(MotionLayers),
}

pub struct MotionExtractor {
    settings: MotionSettings,
    reference: Option<GrayImage>,
}

impl MotionExtractor {
    pub fn new(settings: MotionSettings) -> Self {
        Self {
            settings,
            reference: None,
        }
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    /// Difference `work` against the reference frame.
    ///
    /// The first call stores `work` as the reference and returns `Baseline`.
    /// A frame whose dimensions differ from the reference is rejected and
    /// leaves the reference untouched.
    pub fn extract(&mut self, work: &GrayImage) -> Result<MotionOutcome> {
        let Some(reference) = self.reference.as_ref() else {
            self.reference = Some(work.clone());
            return Ok(MotionOutcome::Baseline);
        };

        if reference.dimensions() != work.dimensions() {
            return Err(anyhow!(
                "work frame is {}x{} but reference is {}x{}",
                work.width(),
                work.height(),
                reference.width(),
                reference.height()
            ));
        }

        let delta = absolute_difference(reference, work);
        let mask = threshold(&delta, self.settings.threshold, ThresholdType::Binary);
        let dilated = dilate_mask(&mask, self.settings.dilate_iterations);
        let regions = external_regions(&dilated);

        Ok(MotionOutcome::Motion(MotionLayers {
            delta,
            threshold: mask,
            dilated,
            regions,
        }))
    }
}

/// Per-pixel `|a - b|`. Both images must share dimensions.
pub fn absolute_difference(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y)[0].abs_diff(b.get_pixel(x, y)[0])])
    })
}

/// `iterations` passes of a 3x3 square dilation, expressed as one L-infinity dilation.
pub fn dilate_mask(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    dilate(mask, Norm::LInf, iterations)
}

/// Bounding boxes and areas of the outermost contours of a binary mask.
pub fn external_regions(mask: &GrayImage) -> Vec<MotionRegion> {
    let contours: Vec<Contour<i32>> = find_contours(mask);
    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let bbox = BoundingBox::enclosing(
                c.points
                    .iter()
                    .map(|p| (p.x.max(0) as u32, p.y.max(0) as u32)),
            )?;
            Some(MotionRegion {
                bbox,
                area: contour_area(&c.points).abs(),
            })
        })
        .collect()
}
