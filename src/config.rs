use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DetectorSettings;
use crate::history::{DEFAULT_DISPLAY_ENTRIES, DEFAULT_LOG_CAPACITY};
use crate::ingest::InputSource;
use crate::notify::DEFAULT_ALERT_SOUND;

const DEFAULT_FRAME_PAUSE_MS: u64 = 50;
const DEFAULT_TARGET_FPS: u32 = 20;
const DEFAULT_CAPTURE_WIDTH: u32 = 640;
const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

/// Confidence threshold, kept on the slider grid `0.25..=0.9` in `0.05` steps.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub const MIN: f32 = 0.25;
    pub const MAX: f32 = 0.9;
    pub const STEP: f32 = 0.05;
    pub const DEFAULT: Threshold = Threshold(0.5);

    /// Strict constructor for configured values.
    pub fn new(value: f32) -> Result<Self> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(anyhow!(
                "confidence threshold must be within {}..={} (got {})",
                Self::MIN,
                Self::MAX,
                value
            ));
        }
        Ok(Self::snapped(value))
    }

    /// Lenient constructor for live input: clamp, then snap to the step grid.
    pub fn snapped(value: f32) -> Self {
        if !value.is_finite() {
            return Self::DEFAULT;
        }
        let clamped = value.clamp(Self::MIN, Self::MAX);
        let steps = ((clamped - Self::MIN) / Self::STEP).round();
        let snapped = Self::MIN + steps * Self::STEP;
        // Round away float noise so 0.25 + 5 * 0.05 reads as 0.5.
        Self(((snapped * 100.0).round() / 100.0).clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    confidence_threshold: Option<f32>,
    input: Option<InputSource>,
    alert_sound: Option<PathBuf>,
    frame_pause_ms: Option<u64>,
    snapshot_path: Option<PathBuf>,
    caption_font: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    capture: Option<CaptureConfigFile>,
    log: Option<LogConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    min_score: Option<f32>,
    iou_threshold: Option<f32>,
    script_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LogConfigFile {
    display: Option<usize>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub confidence_threshold: Threshold,
    pub input: InputSource,
    pub alert_sound: PathBuf,
    /// Cooperative pause between frames.
    pub frame_pause: Duration,
    /// Where the console surface writes the latest annotated frame.
    pub snapshot_path: Option<PathBuf>,
    /// Font for captions drawn onto frames.
    pub caption_font: Option<PathBuf>,
    pub detector: DetectorConfig,
    pub capture: CaptureSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Registry name; `None` picks the registry default.
    pub backend: Option<String>,
    pub settings: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub display: usize,
    pub capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::assemble(AppConfigFile::default(), Threshold::DEFAULT)
    }
}

impl AppConfig {
    /// Load from `ANIMAL_WATCH_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ANIMAL_WATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let confidence_threshold = match file.confidence_threshold {
            Some(value) => Threshold::new(value)?,
            None => Threshold::DEFAULT,
        };
        Ok(Self::assemble(file, confidence_threshold))
    }

    fn assemble(file: AppConfigFile, confidence_threshold: Threshold) -> Self {
        let detector_file = file.detector.unwrap_or_default();
        let defaults = DetectorSettings::default();
        let detector = DetectorConfig {
            backend: detector_file.backend,
            settings: DetectorSettings {
                model_path: detector_file.model_path.unwrap_or(defaults.model_path),
                input_size: detector_file.input_size.unwrap_or(defaults.input_size),
                min_score: detector_file.min_score.unwrap_or(defaults.min_score),
                iou_threshold: detector_file
                    .iou_threshold
                    .unwrap_or(defaults.iou_threshold),
                script_path: detector_file.script_path,
            },
        };
        let capture = CaptureSettings {
            target_fps: file
                .capture
                .as_ref()
                .and_then(|c| c.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            width: file
                .capture
                .as_ref()
                .and_then(|c| c.width)
                .unwrap_or(DEFAULT_CAPTURE_WIDTH),
            height: file
                .capture
                .as_ref()
                .and_then(|c| c.height)
                .unwrap_or(DEFAULT_CAPTURE_HEIGHT),
        };
        let log = LogSettings {
            display: file
                .log
                .as_ref()
                .and_then(|l| l.display)
                .unwrap_or(DEFAULT_DISPLAY_ENTRIES),
            capacity: file
                .log
                .and_then(|l| l.capacity)
                .unwrap_or(DEFAULT_LOG_CAPACITY),
        };
        Self {
            confidence_threshold,
            input: file.input.unwrap_or_default(),
            alert_sound: file
                .alert_sound
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ALERT_SOUND)),
            frame_pause: Duration::from_millis(
                file.frame_pause_ms.unwrap_or(DEFAULT_FRAME_PAUSE_MS),
            ),
            snapshot_path: file.snapshot_path,
            caption_font: file.caption_font,
            detector,
            capture,
            log,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("ANIMAL_WATCH_THRESHOLD") {
            let parsed: f32 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("ANIMAL_WATCH_THRESHOLD must be a number"))?;
            self.confidence_threshold = Threshold::new(parsed)?;
        }
        if let Ok(path) = std::env::var("ANIMAL_WATCH_VIDEO") {
            if !path.trim().is_empty() {
                self.input = InputSource::file(path);
            }
        }
        if let Ok(device) = std::env::var("ANIMAL_WATCH_WEBCAM") {
            if !device.trim().is_empty() {
                self.input = InputSource::webcam(device);
            }
        }
        if let Ok(path) = std::env::var("ANIMAL_WATCH_ALERT_SOUND") {
            if !path.trim().is_empty() {
                self.alert_sound = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("ANIMAL_WATCH_MODEL") {
            if !path.trim().is_empty() {
                self.detector.settings.model_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("ANIMAL_WATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = Some(backend);
            }
        }
        if let Ok(pause) = std::env::var("ANIMAL_WATCH_FRAME_PAUSE_MS") {
            let ms: u64 = pause.trim().parse().map_err(|_| {
                anyhow!("ANIMAL_WATCH_FRAME_PAUSE_MS must be an integer number of milliseconds")
            })?;
            self.frame_pause = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.detector.settings.input_size == 0 || self.detector.settings.input_size % 32 != 0 {
            return Err(anyhow!(
                "detector input_size must be a positive multiple of 32 (got {})",
                self.detector.settings.input_size
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.settings.min_score) {
            return Err(anyhow!("detector min_score must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.detector.settings.iou_threshold) {
            return Err(anyhow!("detector iou_threshold must be within 0..=1"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        if self.log.display == 0 {
            return Err(anyhow!("log display must show at least one entry"));
        }
        self.log.capacity = self.log.capacity.max(self.log.display);
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
