use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveSettings;
use crate::detect::MotionSettings;
use crate::frame::PreprocessSettings;
use crate::ingest::SourceConfig;
use crate::recognize::RecognitionSettings;
use crate::track::{LifecycleThresholds, TrackerSettings};

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotiondConfigFile {
    source: Option<SourceConfigFile>,
    preprocess: Option<PreprocessConfigFile>,
    motion: Option<MotionConfigFile>,
    tracker: Option<TrackerConfigFile>,
    lifecycle: Option<LifecycleConfigFile>,
    archive: Option<ArchiveConfigFile>,
    recognition: Option<RecognitionConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PreprocessConfigFile {
    work_width: Option<u32>,
    blur_kernel: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    threshold: Option<u8>,
    dilate_iterations: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    min_object_area: Option<u32>,
    movement_tolerance: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LifecycleConfigFile {
    young_min_secs: Option<u64>,
    young_max_secs: Option<u64>,
    hidden_factor: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ArchiveConfigFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RecognitionConfigFile {
    enabled: Option<bool>,
    api_key: Option<String>,
    model_id: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    output_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct MotiondConfig {
    pub source: SourceConfig,
    pub preprocess: PreprocessSettings,
    pub motion: MotionSettings,
    pub tracker: TrackerSettings,
    pub lifecycle: LifecycleThresholds,
    pub archive: ArchiveSettings,
    pub recognition: RecognitionSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Default)]
pub struct DisplaySettings {
    /// Folder that receives every view as PNG. No output when unset.
    pub output_dir: Option<PathBuf>,
    /// TrueType font for captions and labels. The built-in bitmap font is used when unset.
    pub font_path: Option<PathBuf>,
}

impl MotiondConfig {
    /// Defaults, then the file named by `MOTION_CONFIG`, then `MOTION_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MOTION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MotiondConfigFile) -> Self {
        let mut cfg = Self::default();

        if let Some(source) = file.source {
            if let Some(url) = source.url {
                cfg.source.url = url;
            }
            if let Some(fps) = source.target_fps {
                cfg.source.target_fps = fps;
            }
        }
        if let Some(preprocess) = file.preprocess {
            if let Some(width) = preprocess.work_width {
                cfg.preprocess.work_width = width;
            }
            if let Some(kernel) = preprocess.blur_kernel {
                cfg.preprocess.blur_kernel = kernel;
            }
        }
        if let Some(motion) = file.motion {
            if let Some(threshold) = motion.threshold {
                cfg.motion.threshold = threshold;
            }
            if let Some(iterations) = motion.dilate_iterations {
                cfg.motion.dilate_iterations = iterations;
            }
        }
        if let Some(tracker) = file.tracker {
            if let Some(area) = tracker.min_object_area {
                cfg.tracker.min_object_area = area;
            }
            if let Some(tolerance) = tracker.movement_tolerance {
                cfg.tracker.movement_tolerance = tolerance;
            }
        }
        if let Some(lifecycle) = file.lifecycle {
            if let Some(secs) = lifecycle.young_min_secs {
                cfg.lifecycle.young_min_secs = secs;
            }
            if let Some(secs) = lifecycle.young_max_secs {
                cfg.lifecycle.young_max_secs = secs;
            }
            if let Some(factor) = lifecycle.hidden_factor {
                cfg.lifecycle.hidden_factor = factor;
            }
        }
        if let Some(path) = file.archive.and_then(|archive| archive.path) {
            cfg.archive.path = path;
        }
        if let Some(recognition) = file.recognition {
            cfg.recognition.enabled = recognition.enabled.unwrap_or(false);
            if let Some(key) = recognition.api_key {
                cfg.recognition.api_key = key;
            }
            if let Some(model) = recognition.model_id {
                cfg.recognition.model_id = model;
            }
            if let Some(url) = recognition.api_url {
                cfg.recognition.api_url = url;
            }
        }
        if let Some(display) = file.display {
            cfg.display.output_dir = display.output_dir;
            cfg.display.font_path = display.font_path;
        }
        cfg
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_var("MOTION_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(path) = non_empty_var("MOTION_ARCHIVE_PATH") {
            self.archive.path = PathBuf::from(path);
        }
        if let Some(area) = non_empty_var("MOTION_MIN_OBJECT_AREA") {
            self.tracker.min_object_area = area
                .parse()
                .map_err(|_| anyhow!("MOTION_MIN_OBJECT_AREA must be a non-negative integer"))?;
        }
        if let Some(tolerance) = non_empty_var("MOTION_MOVEMENT_TOLERANCE") {
            self.tracker.movement_tolerance = tolerance
                .parse()
                .map_err(|_| anyhow!("MOTION_MOVEMENT_TOLERANCE must be a non-negative integer"))?;
        }
        if let Some(flag) = non_empty_var("MOTION_RECOGNIZE") {
            self.recognition.enabled = parse_flag("MOTION_RECOGNIZE", &flag)?;
        }
        if let Some(key) = non_empty_var("MOTION_RECOGNITION_KEY") {
            self.recognition.api_key = key;
        }
        if let Some(dir) = non_empty_var("MOTION_OUTPUT_DIR") {
            self.display.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = non_empty_var("MOTION_FONT_PATH") {
            self.display.font_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target_fps must be at least 1"));
        }
        self.preprocess.validate()?;
        self.lifecycle.validate()?;
        self.recognition.validate()?;
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} must be a boolean flag, got {:?}", key, other)),
    }
}

/// JSON by default; `.toml` files are read as TOML.
fn read_config_file(path: &Path) -> Result<MotiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
