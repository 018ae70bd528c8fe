//! Alert sound notifier.
//!
//! `Notifier::notify` plays the alert sound on a fresh thread so audio decoding
//! and playback never stall the frame loop. Nothing from the playback thread
//! flows back into the caller: a missing asset or a playback failure is routed
//! to a [`ReportSink`] and the thread ends.

mod player;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(feature = "audio-rodio")]
pub use player::RodioPlayer;
pub use player::{default_player, BellPlayer, SoundPlayer};

/// Default alert sound, resolved against the working directory.
pub const DEFAULT_ALERT_SOUND: &str = "alert.mp3";

/// User-facing sink for non-fatal problems.
///
/// Implementations are shared with notifier threads and must be thread-safe.
pub trait ReportSink: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that only writes to the process log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Handle to one playback attempt.
///
/// Dropping it detaches the thread; tests can [`NotifyHandle::wait`] on it.
#[derive(Debug)]
pub struct NotifyHandle {
    thread: Option<JoinHandle<()>>,
}

impl NotifyHandle {
    /// Block until the playback thread finishes.
    ///
    /// Returns `false` if the thread was never started or panicked.
    pub fn wait(self) -> bool {
        match self.thread {
            Some(thread) => thread.join().is_ok(),
            None => false,
        }
    }

    pub fn is_spawned(&self) -> bool {
        self.thread.is_some()
    }
}

/// Fire-and-forget alert sound trigger.
#[derive(Clone)]
pub struct Notifier {
    asset: PathBuf,
    player: Arc<dyn SoundPlayer>,
    reports: Arc<dyn ReportSink>,
}

impl Notifier {
    pub fn new(
        asset: impl Into<PathBuf>,
        player: Arc<dyn SoundPlayer>,
        reports: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            asset: asset.into(),
            player,
            reports,
        }
    }

    pub fn asset(&self) -> &Path {
        &self.asset
    }

    /// Start playing the alert sound without blocking.
    pub fn notify(&self) -> NotifyHandle {
        let asset = self.asset.clone();
        let player = Arc::clone(&self.player);
        let reports = Arc::clone(&self.reports);
        let spawned = thread::Builder::new()
            .name("alert-sound".to_string())
            .spawn(move || play_alert(&asset, player.as_ref(), reports.as_ref()));
        match spawned {
            Ok(thread) => NotifyHandle {
                thread: Some(thread),
            },
            Err(e) => {
                self.reports
                    .error(&format!("sound error: failed to start playback thread: {e}"));
                NotifyHandle { thread: None }
            }
        }
    }
}

fn play_alert(asset: &Path, player: &dyn SoundPlayer, reports: &dyn ReportSink) {
    if !asset.exists() {
        reports.warn(&format!("⚠️ '{}' not found in folder.", asset.display()));
        return;
    }
    log::debug!("playing alert sound {} via {}", asset.display(), player.name());
    if let Err(e) = player.play(asset) {
        reports.error(&format!("sound error: {e:#}"));
    }
}
