//! Detection session.
//!
//! A `Session` owns everything one detection loop touches: the selected input,
//! the open frame source, the detector, alert memory, the detection log and
//! the output surface. It is driven by [`Command`]s, either applied directly or
//! received over a channel by [`Session::run`].
//!
//! The loop is single-threaded. The only other threads are the notifier's
//! playback threads, which never report back into the session.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::alert::{AlertDecision, AlertState};
use crate::config::{AppConfig, Threshold};
use crate::detect::DetectorBackend;
use crate::history::{DetectionLog, DEFAULT_DISPLAY_ENTRIES, DEFAULT_LOG_CAPACITY};
use crate::ingest::{FrameSource, InputSource, SourceProvider};
use crate::notify::Notifier;
use crate::render::{Renderer, Surface};

/// Shown when a stream runs dry or a read fails.
pub const STREAM_ENDED_WARNING: &str = "Video ended or no camera input detected.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Detecting,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    SetThreshold(f32),
    SelectInput(InputSource),
    Shutdown,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    /// Parse one interactive command line.
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let rest: Vec<&str> = parts.collect();
        let command = match (verb.as_str(), rest.as_slice()) {
            ("start", []) => Command::Start,
            ("stop", []) => Command::Stop,
            ("quit" | "exit", []) => Command::Shutdown,
            ("threshold", [value]) => {
                let value: f32 = value
                    .parse()
                    .map_err(|_| anyhow!("threshold must be a number, got '{}'", value))?;
                Command::SetThreshold(value)
            }
            ("video", [_, ..]) => Command::SelectInput(InputSource::file(rest.join(" "))),
            ("webcam", []) => Command::SelectInput(InputSource::default()),
            ("webcam", [device]) => Command::SelectInput(InputSource::webcam(*device)),
            _ => bail!(
                "unknown command '{}' (try: start, stop, threshold <value>, video <path>, webcam [device], quit)",
                line.trim()
            ),
        };
        Ok(command)
    }
}

/// Counters reported when the session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub runs: u64,
    pub frames_processed: u64,
    pub alerts: u64,
    pub sounds_triggered: u64,
}

/// What a single [`Session::step`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do; the session is idle.
    Idle,
    /// One frame was processed.
    Frame(AlertDecision),
    /// The stream ended or failed and the session went idle.
    Ended,
    /// The detector failed and the session went idle.
    Failed,
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub threshold: Threshold,
    pub input: Option<InputSource>,
    pub frame_pause: Duration,
    pub log_display: usize,
    pub log_capacity: usize,
    /// TrueType font for frame captions; system fonts are tried otherwise.
    pub caption_font: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            threshold: Threshold::DEFAULT,
            input: None,
            frame_pause: Duration::from_millis(50),
            log_display: DEFAULT_DISPLAY_ENTRIES,
            log_capacity: DEFAULT_LOG_CAPACITY,
            caption_font: None,
        }
    }
}

impl SessionSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            threshold: cfg.confidence_threshold,
            input: Some(cfg.input.clone()),
            frame_pause: cfg.frame_pause,
            log_display: cfg.log.display,
            log_capacity: cfg.log.capacity,
            caption_font: cfg.caption_font.clone(),
        }
    }
}

pub struct Session {
    provider: Box<dyn SourceProvider>,
    source: Option<Box<dyn FrameSource>>,
    detector: Box<dyn DetectorBackend>,
    renderer: Renderer,
    surface: Box<dyn Surface>,
    notifier: Notifier,
    alert: AlertState,
    log: DetectionLog,
    threshold: Threshold,
    input: Option<InputSource>,
    frame_pause: Duration,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        provider: Box<dyn SourceProvider>,
        detector: Box<dyn DetectorBackend>,
        surface: Box<dyn Surface>,
        notifier: Notifier,
        settings: SessionSettings,
    ) -> Self {
        Self {
            provider,
            source: None,
            detector,
            renderer: Renderer::load(settings.caption_font.as_deref()),
            surface,
            notifier,
            alert: AlertState::new(),
            log: DetectionLog::new(settings.log_display, settings.log_capacity),
            threshold: settings.threshold,
            input: settings.input,
            frame_pause: settings.frame_pause,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.source.is_some() {
            SessionState::Detecting
        } else {
            SessionState::Idle
        }
    }

    pub fn is_detecting(&self) -> bool {
        self.state() == SessionState::Detecting
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn input(&self) -> Option<&InputSource> {
        self.input.as_ref()
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alert
    }

    pub fn log(&self) -> &DetectionLog {
        &self.log
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Open the selected input and begin detecting. No-op while detecting.
    pub fn start(&mut self) {
        if self.is_detecting() {
            log::debug!("start ignored: already detecting");
            return;
        }
        let Some(input) = self.input.clone() else {
            self.surface.warn("No input selected.");
            return;
        };
        match self.provider.open(&input) {
            Ok(source) => {
                log::info!("detection started on {}", source.describe());
                self.source = Some(source);
                self.alert.reset();
                self.stats.runs += 1;
                self.surface.status(&format!("Detecting on {input}"));
            }
            Err(err) => {
                log::warn!("failed to open {}: {:#}", input, err);
                self.surface
                    .warn(&format!("Could not open {input}: {err:#}"));
            }
        }
    }

    /// Stop detecting and release the source. No-op while idle.
    pub fn stop(&mut self) {
        if self.finish() {
            self.surface.status("Detection stopped");
        }
    }

    /// Change the threshold. Applies from the next frame.
    pub fn set_threshold(&mut self, value: f32) {
        let threshold = Threshold::snapped(value);
        if threshold != self.threshold {
            log::info!("confidence threshold {} -> {}", self.threshold, threshold);
        }
        self.threshold = threshold;
        self.surface
            .status(&format!("Confidence threshold {threshold}"));
    }

    /// Choose a new input. Stops the current run first.
    pub fn select_input(&mut self, input: InputSource) {
        if self.is_detecting() {
            self.stop();
        }
        log::info!("input selected: {}", input);
        self.surface.status(&format!("Input: {input}"));
        self.input = Some(input);
    }

    /// Apply one command. Returns `false` once the session should end.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::SetThreshold(value) => self.set_threshold(value),
            Command::SelectInput(input) => self.select_input(input),
            Command::Shutdown => {
                self.stop();
                return false;
            }
        }
        true
    }

    /// Process one frame if detecting.
    pub fn step(&mut self) -> StepOutcome {
        let Some(source) = self.source.as_mut() else {
            return StepOutcome::Idle;
        };
        let mut frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("{} ended after {} frames", source.describe(), source.frames_captured());
                self.surface.warn(STREAM_ENDED_WARNING);
                self.finish();
                return StepOutcome::Ended;
            }
            Err(err) => {
                log::warn!("{} read failed: {:#}", source.describe(), err);
                self.surface.warn(STREAM_ENDED_WARNING);
                self.finish();
                return StepOutcome::Ended;
            }
        };

        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                self.surface
                    .error(&format!("detector {} failed: {err:#}", self.detector.name()));
                self.finish();
                return StepOutcome::Failed;
            }
        };
        log::trace!("frame {}: {} detections", frame.index, detections.len());

        let threshold = self.threshold.value();
        let decision = self.alert.evaluate(&detections, threshold);
        let captions = self.renderer.annotate(&mut frame, &detections, threshold);

        if decision.is_new {
            log::debug!("new alert: {:?}", decision.label);
            // The handle is dropped; playback runs detached.
            let _ = self.notifier.notify();
            self.stats.sounds_triggered += 1;
        }
        self.alert.observe(&decision);

        match decision.label.as_deref() {
            Some(label) if decision.is_alert => {
                self.log.record(label);
                self.stats.alerts += 1;
                self.surface.set_alert(true);
                self.surface.show_log(&self.log.recent_lines());
            }
            _ => self.surface.set_alert(false),
        }

        self.surface.show_frame(&frame, &captions);
        self.stats.frames_processed += 1;
        StepOutcome::Frame(decision)
    }

    /// Drive the session from `commands` until shutdown.
    ///
    /// Pending commands are drained before every frame. When the channel is
    /// disconnected the session keeps detecting until its stream ends.
    pub fn run(&mut self, commands: &Receiver<Command>) -> Result<SessionStats> {
        let mut connected = true;
        loop {
            while connected {
                match commands.try_recv() {
                    Ok(command) => {
                        if !self.apply(command) {
                            return Ok(self.stats);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => connected = false,
                }
            }

            if self.is_detecting() {
                self.step();
                std::thread::sleep(self.frame_pause);
                continue;
            }

            if !connected {
                log::info!("command channel closed; session ending");
                return Ok(self.stats);
            }
            match commands.recv_timeout(self.frame_pause) {
                Ok(command) => {
                    if !self.apply(command) {
                        return Ok(self.stats);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => connected = false,
            }
        }
    }

    /// Leave the detecting state. Returns whether a run was active.
    fn finish(&mut self) -> bool {
        let Some(mut source) = self.source.take() else {
            return false;
        };
        source.close();
        log::info!(
            "detection stopped on {} ({} frames)",
            source.describe(),
            source.frames_captured()
        );
        self.alert.reset();
        self.surface.set_alert(false);
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, ScriptedBackend};
    use crate::frame::Frame;
    use crate::notify::{LogSink, ReportSink, SoundPlayer};
    use image::RgbImage;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    struct CountedSource {
        remaining: u64,
        captured: u64,
        closed: Arc<AtomicUsize>,
    }

    impl FrameSource for CountedSource {
        fn describe(&self) -> String {
            "counted".to_string()
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            self.captured += 1;
            Ok(Some(Frame::new(RgbImage::new(32, 32), self.captured)))
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }

        fn frames_captured(&self) -> u64 {
            self.captured
        }
    }

    #[derive(Clone, Default)]
    struct Recorded {
        warnings: Arc<Mutex<Vec<String>>>,
        banners: Arc<Mutex<Vec<bool>>>,
    }

    impl ReportSink for Recorded {
        fn warn(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }

    impl Surface for Recorded {
        fn show_frame(&mut self, _frame: &Frame, _captions: &[String]) {}

        fn set_alert(&mut self, active: bool) {
            self.banners.lock().unwrap().push(active);
        }

        fn show_log(&mut self, _lines: &[String]) {}
    }

    struct Silent;

    impl SoundPlayer for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn play(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(1, 1, 8, 8).unwrap(), label, confidence)
    }

    fn session(
        frames: u64,
        script: Vec<Vec<Detection>>,
    ) -> (Session, Recorded, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let (o, c) = (opened.clone(), closed.clone());
        let provider = move |_input: &InputSource| -> Result<Box<dyn FrameSource>> {
            o.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountedSource {
                remaining: frames,
                captured: 0,
                closed: c.clone(),
            }))
        };
        let recorded = Recorded::default();
        let notifier = Notifier::new("missing-alert.mp3", Arc::new(Silent), Arc::new(LogSink));
        let session = Session::new(
            Box::new(provider),
            Box::new(ScriptedBackend::new(script)),
            Box::new(recorded.clone()),
            notifier,
            SessionSettings {
                input: Some(InputSource::file("stub://clip")),
                frame_pause: Duration::from_millis(1),
                ..SessionSettings::default()
            },
        );
        (session, recorded, opened, closed)
    }

    #[test]
    fn parses_interactive_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!(" STOP ".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Shutdown);
        assert_eq!(
            "threshold 0.65".parse::<Command>().unwrap(),
            Command::SetThreshold(0.65)
        );
        assert_eq!(
            "video my road.mp4".parse::<Command>().unwrap(),
            Command::SelectInput(InputSource::file("my road.mp4"))
        );
        assert_eq!(
            "webcam".parse::<Command>().unwrap(),
            Command::SelectInput(InputSource::webcam("/dev/video0"))
        );
        assert!("threshold high".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn start_is_idempotent() {
        let (mut s, _, opened, _) = session(5, vec![]);
        s.start();
        s.start();
        assert_eq!(s.state(), SessionState::Detecting);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let (mut s, _, _, closed) = session(5, vec![]);
        s.stop();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_without_input_warns() {
        let (mut s, recorded, opened, _) = session(5, vec![]);
        s.input = None;
        s.start();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert_eq!(recorded.warnings.lock().unwrap().len(), 1);
    }

    #[test]
    fn stream_end_goes_idle_and_closes_source() {
        let (mut s, recorded, _, closed) = session(1, vec![]);
        s.start();
        assert!(matches!(s.step(), StepOutcome::Frame(_)));
        assert_eq!(s.step(), StepOutcome::Ended);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorded.warnings.lock().unwrap().as_slice(),
            &[STREAM_ENDED_WARNING.to_string()]
        );
        assert_eq!(s.step(), StepOutcome::Idle);
    }

    #[test]
    fn stop_resets_alert_memory() {
        let (mut s, _, _, _) = session(5, vec![vec![det("dog", 0.9)]]);
        s.start();
        s.step();
        assert_eq!(s.alert_state().last_alerted_label(), Some("dog"));
        s.stop();
        assert_eq!(s.alert_state().last_alerted_label(), None);
    }

    #[test]
    fn threshold_changes_apply_to_next_frame() {
        let (mut s, _, _, _) = session(5, vec![vec![det("cat", 0.6)], vec![det("cat", 0.6)]]);
        s.start();
        let StepOutcome::Frame(first) = s.step() else {
            panic!("expected a frame");
        };
        assert!(first.is_alert);
        s.apply(Command::SetThreshold(0.72));
        assert_eq!(s.threshold().value(), 0.7);
        let StepOutcome::Frame(second) = s.step() else {
            panic!("expected a frame");
        };
        assert!(!second.is_alert);
    }

    #[test]
    fn select_input_stops_the_current_run() {
        let (mut s, _, _, closed) = session(5, vec![]);
        s.start();
        s.apply(Command::SelectInput(InputSource::webcam("stub://cam")));
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(s.input(), Some(&InputSource::webcam("stub://cam")));
    }

    #[test]
    fn run_processes_until_stream_ends_after_disconnect() -> Result<()> {
        let (mut s, _, _, closed) = session(3, vec![vec![det("cow", 0.8)]]);
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Start)?;
        drop(tx);
        let stats = s.run(&rx)?;
        assert_eq!(stats.frames_processed, 3);
        assert_eq!(stats.alerts, 1);
        assert_eq!(stats.sounds_triggered, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn shutdown_ends_run_and_closes_source() -> Result<()> {
        let (mut s, _, _, closed) = session(u64::MAX, vec![]);
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Start)?;
        tx.send(Command::Shutdown)?;
        s.run(&rx)?;
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
