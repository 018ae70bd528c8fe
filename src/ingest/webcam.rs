//! Webcam frame source.
//!
//! This module provides `WebcamSource` for frames from a local camera.
//!
//! The webcam source is responsible for:
//! - Opening the device node (e.g., /dev/video0) through V4L2
//! - Negotiating RGB24 capture, falling back to YUYV with in-memory conversion
//! - Reporting a dropped camera as end of stream
//!
//! `stub://` devices produce an endless synthetic stream.

use anyhow::{anyhow, Result};

use super::synthetic::SyntheticSource;
use super::{is_stub_location, FrameSource};
use crate::frame::Frame;

/// Configuration for a webcam source.
#[derive(Clone, Debug)]
pub struct WebcamConfig {
    /// Device path (e.g., "/dev/video0") or `stub://` location.
    pub device: String,
    /// Requested capture rate.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device: super::DEFAULT_WEBCAM_DEVICE.to_string(),
            target_fps: 20,
            width: 640,
            height: 480,
        }
    }
}

/// Webcam frame source.
pub struct WebcamSource {
    backend: WebcamBackend,
    device: String,
}

enum WebcamBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(device::DeviceSource),
}

impl WebcamSource {
    pub fn new(config: WebcamConfig) -> Result<Self> {
        if config.device.trim().is_empty() {
            return Err(anyhow!("webcam device must not be empty"));
        }
        let device = config.device.clone();
        let backend = if is_stub_location(&config.device) {
            WebcamBackend::Synthetic(SyntheticSource::new(
                &config.device,
                config.width,
                config.height,
                None,
            ))
        } else {
            open_device(config)?
        };
        Ok(Self { backend, device })
    }

    /// Connect to the camera.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => {
                log::info!("WebcamSource: connected to {} (synthetic)", source.location());
                Ok(())
            }
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.connect(),
        }
    }
}

impl FrameSource for WebcamSource {
    fn describe(&self) -> String {
        self.device.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            WebcamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            WebcamBackend::Synthetic(_) => {}
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.close(),
        }
        log::info!(
            "WebcamSource: closed {} after {} frames",
            self.device,
            self.frames_captured()
        );
    }

    fn frames_captured(&self) -> u64 {
        match &self.backend {
            WebcamBackend::Synthetic(source) => source.frames_captured(),
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(source) => source.frames_captured(),
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(config: WebcamConfig) -> Result<WebcamBackend> {
    Ok(WebcamBackend::Device(device::DeviceSource::new(config)))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(config: WebcamConfig) -> Result<WebcamBackend> {
    Err(anyhow!(
        "cannot open {}: webcam capture requires the ingest-v4l2 feature",
        config.device
    ))
}

// ----------------------------------------------------------------------------
// V4L2 capture
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;

    use super::WebcamConfig;
    use crate::frame::Frame;
    use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

    pub(super) struct DeviceSource {
        config: WebcamConfig,
        state: Option<DeviceState>,
        frame_count: u64,
        format: PixelFormat,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceSource {
        pub(super) fn new(config: WebcamConfig) -> Self {
            Self {
                active_width: config.width,
                active_height: config.height,
                config,
                state: None,
                frame_count: 0,
                format: PixelFormat::Rgb24,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.config.device)
                .with_context(|| format!("open camera {}", self.config.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "WebcamSource: failed to set RGB3 on {}: {}",
                        self.config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            self.format = match &format.fourcc.repr {
                b"RGB3" => PixelFormat::Rgb24,
                b"YUYV" => PixelFormat::Yuyv,
                other => {
                    return Err(anyhow::anyhow!(
                        "camera {} delivers unsupported pixel format {}",
                        self.config.device,
                        String::from_utf8_lossy(other)
                    ))
                }
            };

            if self.config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "WebcamSource: failed to set fps on {}: {}",
                        self.config.device,
                        err
                    );
                }
            }

            self.active_width = format.width;
            self.active_height = format.height;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;
            self.state = Some(state);

            log::info!(
                "WebcamSource: connected to {} ({}x{} {:?})",
                self.config.device,
                self.active_width,
                self.active_height,
                self.format
            );
            Ok(())
        }

        /// A failed capture means the camera went away; report end of stream.
        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("camera not connected")?;
            let buf = match state.with_mut(|fields| fields.stream.next()) {
                Ok((buf, _meta)) => buf.to_vec(),
                Err(err) => {
                    log::warn!("WebcamSource: capture on {} failed: {}", self.config.device, err);
                    return Ok(None);
                }
            };

            let pixels =
                normalize_to_rgb(&buf, self.active_width, self.active_height, self.format)?;
            self.frame_count += 1;
            Frame::from_rgb(pixels, self.active_width, self.active_height, self.frame_count)
                .map(Some)
        }

        pub(super) fn close(&mut self) {
            self.state = None;
        }

        pub(super) fn frames_captured(&self) -> u64 {
            self.frame_count
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> WebcamConfig {
        WebcamConfig {
            device: "stub://test".to_string(),
            target_fps: 10,
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn webcam_source_produces_frames() -> Result<()> {
        let mut source = WebcamSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?.expect("frame");
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(source.frames_captured(), 1);

        Ok(())
    }

    #[test]
    fn stub_webcam_can_be_limited() -> Result<()> {
        let mut source = WebcamSource::new(WebcamConfig {
            device: "stub://test?frames=1".to_string(),
            ..stub_config()
        })?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn empty_device_is_rejected() {
        assert!(WebcamSource::new(WebcamConfig {
            device: " ".to_string(),
            ..stub_config()
        })
        .is_err());
    }
}
