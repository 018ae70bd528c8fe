//! Staging of uploaded videos.
//!
//! A selected video is copied into a temp file before decoding starts, so the
//! session never reads from a file the user may still move or overwrite. The
//! copy lives exactly as long as the [`StagedUpload`] and is deleted on drop.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

/// Extensions accepted for uploaded videos (compared case-insensitively).
pub const ACCEPTED_UPLOAD_TYPES: [&str; 3] = ["mp4", "avi", "mov"];

/// Lower-cased extension of an acceptable upload.
pub fn upload_extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if ACCEPTED_UPLOAD_TYPES.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(anyhow!(
            "unsupported video type for {} (accepted: {})",
            path.display(),
            ACCEPTED_UPLOAD_TYPES.join(", ")
        ))
    }
}

/// Ephemeral copy of an uploaded video.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    original: PathBuf,
    bytes: u64,
}

impl StagedUpload {
    pub fn stage(original: &Path) -> Result<Self> {
        let ext = upload_extension(original)?;
        let mut input = File::open(original)
            .with_context(|| format!("failed to open upload {}", original.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix("animal-watch-upload-")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .context("failed to create temp file for upload")?;
        let bytes = io::copy(&mut input, file.as_file_mut())
            .with_context(|| format!("failed to copy upload {}", original.display()))?;
        file.as_file_mut().flush().context("flush staged upload")?;
        log::info!(
            "staged upload {} ({} bytes) at {}",
            original.display(),
            bytes,
            file.path().display()
        );
        Ok(Self {
            file,
            original: original.to_path_buf(),
            bytes,
        })
    }

    /// Location of the temp copy.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}
