//! V4L2 frame source.
//!
//! `V4l2Source` captures frames from a local device node (e.g. /dev/video0)
//! through memory-mapped buffers. RGB24 is requested; NV12 is accepted when
//! the driver refuses it.

use anyhow::{Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{to_rgb_image, PixelFormat};
use super::{FrameSource, SourceStats};

#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested capture rate; the driver may pick another.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frames_captured: u64,
    capture_errors: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frames_captured: 0,
            capture_errors: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr)?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let captured = state.with_mut(|fields| {
            let (buf, _meta) = fields
                .stream
                .next()
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            to_rgb_image(buf, width, height, format)
        });

        match captured {
            Ok(frame) => {
                self.frames_captured += 1;
                self.last_frame_at = Some(Instant::now());
                self.last_error = None;
                Ok(frame)
            }
            Err(err) => {
                self.capture_errors += 1;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            capture_errors: self.capture_errors,
            location: self.config.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() -> Result<()> {
        let mut source = V4l2Source::new(V4l2Config {
            device: "/dev/video-motion-missing".to_string(),
            ..V4l2Config::default()
        })?;
        assert!(source.connect().is_err());
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn health_grace_has_floor() -> Result<()> {
        let source = V4l2Source::new(V4l2Config {
            target_fps: 30,
            ..V4l2Config::default()
        })?;
        assert_eq!(source.health_grace(), Duration::from_millis(2_000));
        Ok(())
    }
}
