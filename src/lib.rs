//! Animal Watch
//!
//! Watches a video file or a webcam for animals on the road ahead and warns the
//! driver.
//!
//! # Pipeline
//!
//! Each frame flows through the same steps:
//!
//! 1. A [`FrameSource`] yields the next decoded frame.
//! 2. A [`DetectorBackend`] turns it into labelled, scored boxes.
//! 3. The alert policy ([`alert`]) keeps animal detections at or above the
//!    confidence threshold and decides whether the alert is new.
//! 4. The renderer draws the qualifying boxes; a new alert plays the alert
//!    sound on a detached thread ([`Notifier`]).
//! 5. Alerting frames are appended to the rolling [`DetectionLog`].
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (uploaded files, webcams, `stub://` synthetics)
//! - `detect`: detector backends and their registry
//! - `alert`: the alert policy and per-run alert memory
//! - `render`: box overlay and the `Surface` output contract
//! - `notify`: fire-and-forget alert sound
//! - `history`: the detection log
//! - `session`: the command-driven state machine tying it together
//! - `config`, `ui`: configuration loading and the terminal surface

pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod history;
pub mod ingest;
pub mod notify;
pub mod render;
pub mod session;
pub mod ui;

pub use alert::{evaluate, AlertDecision, AlertState, ALERT_BANNER, ANIMAL_VOCABULARY};
pub use config::{AppConfig, Threshold};
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend, DetectorSettings};
pub use frame::Frame;
pub use history::{DetectionLog, LogEntry};
pub use ingest::{FrameSource, IngestProvider, InputSource, SourceProvider};
pub use notify::{Notifier, NotifyHandle, ReportSink, SoundPlayer};
pub use render::Surface;
pub use session::{Command, Session, SessionSettings, SessionState, SessionStats, StepOutcome};
