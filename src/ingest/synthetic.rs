//! Synthetic scene source (`stub://`).
//!
//! Renders a static textured background with scripted rectangles ("actors")
//! that appear at one frame and leave at another. Sensor noise is added from a
//! seeded generator, so a given configuration always yields the same frames.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};

/// A rectangle that is present for frames `enter_at..leave_at`.
#[derive(Clone, Debug)]
pub struct Actor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub color: Rgb<u8>,
    pub enter_at: u64,
    pub leave_at: u64,
}

impl Actor {
    fn visible_at(&self, frame: u64) -> bool {
        frame >= self.enter_at && frame < self.leave_at
    }
}

#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Maximum absolute per-channel noise.
    pub noise: u8,
    pub actors: Vec<Actor>,
    /// Restart the script after this many frames. `None` plays it once and
    /// then shows the empty background forever.
    pub loop_after: Option<u64>,
}

impl Default for SceneConfig {
    /// At 10 fps: a parcel dropped at 2s that stays for 30s, and a passer-by
    /// crossing for under a second.
    fn default() -> Self {
        Self {
            name: "stub://scene".to_string(),
            width: 1000,
            height: 600,
            seed: 7,
            noise: 4,
            actors: vec![
                Actor {
                    x: 300,
                    y: 260,
                    width: 140,
                    height: 100,
                    color: Rgb([200, 60, 40]),
                    enter_at: 20,
                    leave_at: 320,
                },
                Actor {
                    x: 700,
                    y: 100,
                    width: 80,
                    height: 160,
                    color: Rgb([30, 40, 220]),
                    enter_at: 60,
                    leave_at: 68,
                },
            ],
            loop_after: Some(900),
        }
    }
}

pub struct SyntheticSource {
    config: SceneConfig,
    background: RgbImage,
    rng: StdRng,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SceneConfig) -> Self {
        let background = textured_background(config.width, config.height);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            background,
            rng,
            frame_count: 0,
            connected: false,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Position in the script of the next frame.
    fn script_frame(&self) -> u64 {
        match self.config.loop_after {
            Some(period) if period > 0 => self.frame_count % period,
            _ => self.frame_count,
        }
    }

    fn render(&mut self, script_frame: u64) -> RgbImage {
        let mut frame = self.background.clone();
        for actor in self.config.actors.iter().filter(|a| a.visible_at(script_frame)) {
            let x_end = actor.x.saturating_add(actor.width).min(frame.width());
            let y_end = actor.y.saturating_add(actor.height).min(frame.height());
            for y in actor.y..y_end {
                for x in actor.x..x_end {
                    frame.put_pixel(x, y, actor.color);
                }
            }
        }

        let amplitude = self.config.noise as i16;
        if amplitude > 0 {
            for pixel in frame.pixels_mut() {
                for channel in pixel.0.iter_mut() {
                    let jitter = self.rng.gen_range(-amplitude..=amplitude);
                    *channel = (*channel as i16 + jitter).clamp(0, 255) as u8;
                }
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!("synthetic scene must have a non-zero size"));
        }
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{}, {} actors)",
            self.config.name,
            self.config.width,
            self.config.height,
            self.config.actors.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        if !self.connected {
            return Err(anyhow!("synthetic source not connected"));
        }
        let script_frame = self.script_frame();
        let frame = self.render(script_frame);
        self.frame_count += 1;
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            capture_errors: 0,
            location: self.config.name.clone(),
        }
    }
}

/// Smooth diagonal gradient with a faint grid, so blur and differencing have
/// something to chew on.
fn textured_background(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let base = ((x + y) % 256) as u8 / 4 + 60;
        let grid = if x % 50 == 0 || y % 50 == 0 { 20 } else { 0 };
        Rgb([base + grid, base + grid / 2, base])
    })
}
