//! Local image file source.
//!
//! `FileSource` reads frames from local image files:
//! - A single image path yields that image on every call
//! - A directory yields its images in file-name order, optionally looping
//!
//! The file source MUST NOT fetch remote URLs.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image file or directory of images.
    pub path: PathBuf,
    /// Start over after the last image of a directory.
    pub looping: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            looping: true,
        }
    }
}

pub struct FileSource {
    config: FileConfig,
    playlist: Vec<PathBuf>,
    cursor: usize,
    frames_captured: u64,
    capture_errors: u64,
    last_error: Option<String>,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(anyhow!("file source path must not be empty"));
        }
        Ok(Self {
            config,
            playlist: Vec::new(),
            cursor: 0,
            frames_captured: 0,
            capture_errors: 0,
            last_error: None,
        })
    }

    /// Files the source will play, in order.
    pub fn playlist(&self) -> &[PathBuf] {
        &self.playlist
    }

    fn next_path(&mut self) -> Result<PathBuf> {
        if self.playlist.is_empty() {
            return Err(anyhow!("file source not connected"));
        }
        if self.cursor >= self.playlist.len() {
            if !self.config.looping {
                return Err(anyhow!(
                    "file source {} exhausted",
                    self.config.path.display()
                ));
            }
            self.cursor = 0;
        }
        let path = self.playlist[self.cursor].clone();
        self.cursor += 1;
        Ok(path)
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        let path = &self.config.path;
        let playlist = if path.is_dir() {
            list_images(path)?
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            return Err(anyhow!("file source {} does not exist", path.display()));
        };
        if playlist.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        log::info!(
            "FileSource: connected to {} ({} images)",
            path.display(),
            playlist.len()
        );
        self.playlist = playlist;
        self.cursor = 0;
        self.last_error = None;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RgbImage> {
        let path = self.next_path()?;
        match image::open(&path) {
            Ok(img) => {
                self.frames_captured += 1;
                self.last_error = None;
                Ok(img.to_rgb8())
            }
            Err(e) => {
                self.capture_errors += 1;
                self.last_error = Some(e.to_string());
                Err(anyhow::Error::new(e).context(format!("decode {}", path.display())))
            }
        }
    }

    fn is_healthy(&self) -> bool {
        !self.playlist.is_empty() && self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            capture_errors: self.capture_errors,
            location: self.config.path.display().to_string(),
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
