//! Snapshot archive.
//!
//! Confirmed objects that go to recognition are first written to a local
//! folder, one JPEG per object, named after the object id. Files are written
//! to a temporary name and renamed so a reader never sees a partial image.

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::track::ObjectId;

pub const DEFAULT_ARCHIVE_PATH: &str = "/tmp";

#[derive(Clone, Debug)]
pub struct ArchiveSettings {
    pub path: PathBuf,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_ARCHIVE_PATH),
        }
    }
}

pub struct SnapshotArchive {
    root: PathBuf,
}

impl SnapshotArchive {
    pub fn new(settings: ArchiveSettings) -> Result<Self> {
        fs::create_dir_all(&settings.path)
            .with_context(|| format!("create archive folder {}", settings.path.display()))?;
        Ok(Self {
            root: settings.path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: ObjectId) -> PathBuf {
        self.root.join(format!("object_found_{}.jpg", id))
    }

    /// Write the snapshot of `id`, replacing any earlier file with the same name.
    pub fn store(&self, id: ObjectId, image: &RgbImage) -> Result<PathBuf> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("refusing to archive empty snapshot for object {}", id));
        }
        let path = self.path_for(id);
        write_atomic(&path, image)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        log::debug!("object {} snapshot written to {}", id, path.display());
        Ok(path)
    }
}

fn write_atomic(path: &Path, image: &RgbImage) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        image.write_to(&mut writer, ImageFormat::Jpeg)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
