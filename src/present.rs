//! Presentation sinks.
//!
//! The pipeline hands every view it produces to a `DisplaySink` once per
//! cycle. Sinks decide what to do with them; the pipeline never draws to a
//! screen or a file itself.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Named image produced by one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
    /// Scaled colour frame with detection and object overlays.
    Frame,
    Gray,
    GrayBlurred,
    Delta,
    Threshold,
    Dilated,
    Reference,
    /// Summary composite of confirmed objects.
    FoundObjects,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Frame,
        View::Gray,
        View::GrayBlurred,
        View::Delta,
        View::Threshold,
        View::Dilated,
        View::Reference,
        View::FoundObjects,
    ];

    pub fn name(self) -> &'static str {
        match self {
            View::Frame => "frame",
            View::Gray => "gray",
            View::GrayBlurred => "gray_blurred",
            View::Delta => "delta",
            View::Threshold => "threshold",
            View::Dilated => "dilated",
            View::Reference => "reference",
            View::FoundObjects => "found_objects",
        }
    }
}

pub trait DisplaySink {
    fn show(&mut self, view: View, image: &DynamicImage) -> Result<()>;

    /// Called once after all views of a cycle were shown.
    fn end_cycle(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn show(&mut self, _view: View, _image: &DynamicImage) -> Result<()> {
        Ok(())
    }
}

/// Writes each view to `<dir>/<view>.png`, overwriting the previous cycle.
pub struct DirectorySink {
    dir: PathBuf,
    views: Option<Vec<View>>,
    cycles: u64,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create output folder {}", dir.display()))?;
        Ok(Self {
            dir,
            views: None,
            cycles: 0,
        })
    }

    /// Only write the listed views.
    pub fn with_views(mut self, views: Vec<View>) -> Self {
        self.views = Some(views);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, view: View) -> PathBuf {
        self.dir.join(format!("{}.png", view.name()))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl DisplaySink for DirectorySink {
    fn show(&mut self, view: View, image: &DynamicImage) -> Result<()> {
        if let Some(views) = &self.views {
            if !views.contains(&view) {
                return Ok(());
            }
        }
        let path = self.path_for(view);
        let tmp_path = path.with_extension("tmp");
        if let Err(e) = write_png(&tmp_path, image) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.context(format!("write view {}", path.display())));
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn end_cycle(&mut self) -> Result<()> {
        self.cycles += 1;
        Ok(())
    }
}

fn write_png(path: &Path, image: &DynamicImage) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    image.write_to(&mut writer, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn view_names_are_unique() {
        let mut names: Vec<_> = View::ALL.iter().map(|v| v.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), View::ALL.len());
    }

    #[test]
    fn directory_sink_writes_png_per_view() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut sink = DirectorySink::new(temp_dir.path().join("views"))?;
        let image = DynamicImage::ImageLuma8(GrayImage::new(8, 6));
        sink.show(View::Delta, &image)?;
        sink.end_cycle()?;

        let written = image::open(sink.path_for(View::Delta))?;
        assert_eq!((written.width(), written.height()), (8, 6));
        assert_eq!(sink.cycles(), 1);
        Ok(())
    }

    #[test]
    fn view_filter_skips_other_views() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut sink =
            DirectorySink::new(temp_dir.path())?.with_views(vec![View::FoundObjects]);
        let image = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        sink.show(View::Gray, &image)?;
        assert!(!sink.path_for(View::Gray).exists());
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_tmp_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut sink = DirectorySink::new(temp_dir.path())?;
        // PNG has no 32-bit float colour type.
        let image = DynamicImage::ImageRgb32F(image::Rgb32FImage::new(4, 4));
        assert!(sink.show(View::Delta, &image).is_err());
        assert!(!sink.path_for(View::Delta).exists());
        assert!(!sink.path_for(View::Delta).with_extension("tmp").exists());
        Ok(())
    }
}
