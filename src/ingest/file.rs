//! Local video file source.
//!
//! This module provides `FileSource` for frames from uploaded video files.
//! The file source is responsible for:
//! - Rejecting URLs and unsupported video types
//! - Decoding frames in-memory (FFmpeg, feature `ingest-file-ffmpeg`)
//! - Holding the staged temp copy of an upload for as long as it is read
//! - Reporting end of stream as `Ok(None)`

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::SyntheticSource;
use super::upload::{upload_extension, StagedUpload};
use super::{is_stub_location, FrameSource};
use crate::frame::Frame;

/// Length of a `stub://` clip without an explicit `frames=` query.
const SYNTHETIC_CLIP_FRAMES: u64 = 100;
const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path, or a `stub://` location.
    pub path: PathBuf,
    /// Stop after this many frames.
    pub frame_limit: Option<u64>,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
    location: String,
    frame_limit: Option<u64>,
    frames_delivered: u64,
    staged: Option<StagedUpload>,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        let location = config.path.to_string_lossy().into_owned();
        if !is_local_file_path(&location) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = if is_stub_location(&location) {
            FileBackend::Synthetic(SyntheticSource::new(
                &location,
                SYNTHETIC_WIDTH,
                SYNTHETIC_HEIGHT,
                Some(SYNTHETIC_CLIP_FRAMES),
            ))
        } else {
            open_decoder(&config.path)?
        };
        Ok(Self {
            backend,
            location,
            frame_limit: config.frame_limit,
            frames_delivered: 0,
            staged: None,
        })
    }

    /// Validate, stage and open a user-selected video.
    ///
    /// `stub://` locations skip staging.
    pub fn open_upload(path: &Path, frame_limit: Option<u64>) -> Result<Self> {
        let location = path.to_string_lossy();
        if is_stub_location(&location) {
            return Self::new(FileConfig {
                path: path.to_path_buf(),
                frame_limit,
            });
        }
        upload_extension(path)?;
        let staged = StagedUpload::stage(path)?;
        let mut source = Self::new(FileConfig {
            path: staged.path().to_path_buf(),
            frame_limit,
        })?;
        source.location = path.display().to_string();
        source.staged = Some(staged);
        Ok(source)
    }

    /// Connect to the file source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => {
                log::info!("FileSource: connected to {} (synthetic)", source.location());
                Ok(())
            }
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Temp copy backing this source, if the file was uploaded.
    pub fn staged(&self) -> Option<&StagedUpload> {
        self.staged.as_ref()
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.location.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frames_delivered >= limit)
        {
            return Ok(None);
        }
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame()?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame()?,
        };
        if frame.is_some() {
            self.frames_delivered += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        log::info!(
            "FileSource: closed {} after {} frames",
            self.location,
            self.frames_delivered
        );
        // Deletes the temp copy of an upload.
        self.staged = None;
    }

    fn frames_captured(&self) -> u64 {
        self.frames_delivered
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_decoder(path: &Path) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegFileSource::new(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_decoder(path: &Path) -> Result<FileBackend> {
    Err(anyhow!(
        "cannot decode {}: file ingestion requires the ingest-file-ffmpeg feature",
        path.display()
    ))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if is_stub_location(path) {
        return true;
    }
    !path.contains("://")
}
