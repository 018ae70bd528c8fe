//! Frame sources.
//!
//! This module provides the two inputs a session can watch:
//! - Uploaded video files (`FileSource`; FFmpeg decoding behind `ingest-file-ffmpeg`)
//! - Webcams (`WebcamSource`; V4L2 capture behind `ingest-v4l2`)
//!
//! Both accept `stub://` locations that produce synthetic frames for tests and
//! demos. Uploaded files are staged into an ephemeral temp copy before they are
//! opened (see [`upload`]).
//!
//! Sources are pulled synchronously, one frame at a time. `Ok(None)` means the
//! stream is exhausted; a source is closed exactly once, when the session
//! leaves the detecting state.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod normalize;
mod synthetic;
pub mod upload;
pub mod webcam;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use file::{FileConfig, FileSource};
pub use upload::{StagedUpload, ACCEPTED_UPLOAD_TYPES};
pub use webcam::{WebcamConfig, WebcamSource};

/// Default webcam device.
pub const DEFAULT_WEBCAM_DEVICE: &str = "/dev/video0";

/// A synchronous, pull-based frame stream.
pub trait FrameSource: Send {
    /// Human-readable location, for logs and warnings.
    fn describe(&self) -> String;

    /// Pull the next frame. `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying resource. Called once when detection stops.
    fn close(&mut self) {}

    /// Frames delivered so far.
    fn frames_captured(&self) -> u64;
}

/// Which input the user selected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// A video file chosen by the user (mp4, avi, mov).
    UploadedFile { path: PathBuf },
    /// A local camera device.
    Webcam { device: String },
}

impl InputSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::UploadedFile { path: path.into() }
    }

    pub fn webcam(device: impl Into<String>) -> Self {
        Self::Webcam {
            device: device.into(),
        }
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::webcam(DEFAULT_WEBCAM_DEVICE)
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::UploadedFile { path } => write!(f, "video {}", path.display()),
            InputSource::Webcam { device } => write!(f, "webcam {}", device),
        }
    }
}

/// Opens frame sources for a selected input.
///
/// The session calls this on every `Start`; tests substitute closures.
pub trait SourceProvider {
    fn open(&mut self, input: &InputSource) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceProvider for F
where
    F: FnMut(&InputSource) -> Result<Box<dyn FrameSource>>,
{
    fn open(&mut self, input: &InputSource) -> Result<Box<dyn FrameSource>> {
        self(input)
    }
}

/// Provider backed by the real file and webcam sources.
#[derive(Clone, Debug)]
pub struct IngestProvider {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for IngestProvider {
    fn default() -> Self {
        Self {
            target_fps: 20,
            width: 640,
            height: 480,
        }
    }
}

impl SourceProvider for IngestProvider {
    fn open(&mut self, input: &InputSource) -> Result<Box<dyn FrameSource>> {
        match input {
            InputSource::UploadedFile { path } => {
                let mut source = FileSource::open_upload(path, None)?;
                source.connect()?;
                Ok(Box::new(source))
            }
            InputSource::Webcam { device } => {
                let mut source = WebcamSource::new(WebcamConfig {
                    device: device.clone(),
                    target_fps: self.target_fps,
                    width: self.width,
                    height: self.height,
                })?;
                source.connect()?;
                Ok(Box::new(source))
            }
        }
    }
}

/// True for `stub://` locations that produce synthetic frames.
pub fn is_stub_location(location: &str) -> bool {
    location.starts_with("stub://")
}
