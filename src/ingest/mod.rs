//! Frame ingestion sources.
//!
//! Every source yields one colour image per call:
//! - Synthetic scene (`stub://scene`) for demos and tests
//! - Local image files or directories of images
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Sources are responsible for:
//! - Producing full-resolution `RgbImage` frames, nothing else
//! - Reporting health and capture statistics
//!
//! Sources do not downscale, smooth or keep frames after handing them out;
//! that belongs to the preprocessor.

pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use image::RgbImage;

pub use file::{FileConfig, FileSource};
pub use synthetic::{SceneConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

pub const DEFAULT_SOURCE_URL: &str = "stub://scene";
pub const DEFAULT_TARGET_FPS: u32 = 10;

/// Source of colour frames.
pub trait FrameSource {
    /// Open the underlying device or file set.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame. An `Err` only loses the current cycle.
    fn next_frame(&mut self) -> Result<RgbImage>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Capture statistics common to every source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub capture_errors: u64,
    pub location: String,
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://scene`, `v4l2:///dev/video0`, `/dev/videoN`, or a local path.
    pub url: String,
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

/// Build a source for `config.url`. The source is not connected yet.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let url = config.url.trim();
    if url.is_empty() {
        return Err(anyhow!("source url must not be empty"));
    }

    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SceneConfig {
            name: url.to_string(),
            ..SceneConfig::default()
        })));
    }

    if let Some(device) = device_path(url) {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::new(V4l2Config {
                device: device.to_string(),
                target_fps: config.target_fps,
                ..V4l2Config::default()
            })?));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(anyhow!(
                "capture device {} requires the ingest-v4l2 feature",
                device
            ));
        }
    }

    if url.contains("://") {
        return Err(anyhow!("unsupported source url scheme: {}", url));
    }

    Ok(Box::new(FileSource::new(FileConfig {
        path: url.into(),
        ..FileConfig::default()
    })?))
}

fn device_path(url: &str) -> Option<&str> {
    if let Some(rest) = url.strip_prefix("v4l2://") {
        return Some(rest);
    }
    url.starts_with("/dev/video").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_url_opens_synthetic_scene() -> Result<()> {
        let mut source = open_source(&SourceConfig::default())?;
        source.connect()?;
        let frame = source.next_frame()?;
        assert!(frame.width() > 0 && frame.height() > 0);
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn remote_urls_are_rejected() {
        let config = SourceConfig {
            url: "rtsp://camera.local/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(open_source(&config).is_err());
    }

    #[test]
    fn device_paths_are_recognized() {
        assert_eq!(device_path("v4l2:///dev/video2"), Some("/dev/video2"));
        assert_eq!(device_path("/dev/video0"), Some("/dev/video0"));
        assert_eq!(device_path("/srv/frames"), None);
    }
}
