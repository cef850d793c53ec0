//! Frame preprocessing.
//!
//! Every incoming colour frame is reduced to a fixed working width before any
//! differencing happens. The preprocessor produces three images per frame:
//!
//! - `raw`: the scaled colour frame, kept unmodified for snapshotting.
//! - `gray`: single-channel luma of `raw`.
//! - `work`: `gray` after Gaussian smoothing. This is what gets differenced.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Default working width. Frames are downscaled to this width before processing.
pub const DEFAULT_WORK_WIDTH: u32 = 500;

/// Default Gaussian kernel size (pixels, odd).
pub const DEFAULT_BLUR_KERNEL: u32 = 11;

#[derive(Clone, Debug)]
pub struct PreprocessSettings {
    /// Target width of the working frame; height follows the source aspect ratio.
    pub work_width: u32,
    /// Side of the square Gaussian kernel. Must be odd and at least 3.
    pub blur_kernel: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            work_width: DEFAULT_WORK_WIDTH,
            blur_kernel: DEFAULT_BLUR_KERNEL,
        }
    }
}

impl PreprocessSettings {
    pub fn validate(&self) -> Result<()> {
        if self.work_width == 0 {
            return Err(anyhow!("work_width must be greater than zero"));
        }
        if self.blur_kernel < 3 || self.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur_kernel must be an odd number >= 3 (got {})",
                self.blur_kernel
            ));
        }
        Ok(())
    }
}

/// Output of one preprocessing pass.
pub struct PreparedFrame {
    pub raw: RgbImage,
    pub gray: GrayImage,
    pub work: GrayImage,
}

impl PreparedFrame {
    pub fn width(&self) -> u32 {
        self.raw.width()
    }

    pub fn height(&self) -> u32 {
        self.raw.height()
    }
}

pub struct FramePreprocessor {
    settings: PreprocessSettings,
    sigma: f32,
}

impl FramePreprocessor {
    pub fn new(settings: PreprocessSettings) -> Result<Self> {
        settings.validate()?;
        let sigma = kernel_sigma(settings.blur_kernel);
        Ok(Self { settings, sigma })
    }

    pub fn settings(&self) -> &PreprocessSettings {
        &self.settings
    }

    /// Scale, convert and smooth a colour frame.
    ///
    /// Fails on an empty frame; callers treat that as a skipped cycle.
    pub fn prepare(&self, frame: &RgbImage) -> Result<PreparedFrame> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("unreadable frame ({}x{})", width, height));
        }

        let raw = scale_to_width(frame, self.settings.work_width);
        let gray = imageops::grayscale(&raw);
        let work = imageops::blur(&gray, self.sigma);

        Ok(PreparedFrame { raw, gray, work })
    }
}

/// Resize to `target_width`, keeping the aspect ratio. Height is truncated, never below 1.
pub fn scale_to_width(frame: &RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = frame.dimensions();
    if width == target_width {
        return frame.clone();
    }
    let ratio = target_width as f64 / width as f64;
    let target_height = ((height as f64 * ratio) as u32).max(1);
    imageops::resize(frame, target_width, target_height, FilterType::Triangle)
}

/// Standard deviation matching a square Gaussian kernel of side `ksize`.
///
/// Same derivation OpenCV uses when sigma is left at zero.
pub fn kernel_sigma(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
