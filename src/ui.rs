use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::alert::ALERT_BANNER;
use crate::frame::Frame;
use crate::notify::ReportSink;
use crate::render::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Terminal surface for a detection session.
    pub fn console(&self, snapshot: Option<PathBuf>) -> ConsoleSurface {
        let status = self.use_pretty().then(|| spinner("idle".to_string()));
        ConsoleSurface {
            status,
            snapshot,
            alert_active: false,
            last_log: Vec::new(),
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Prints session output to the terminal.
///
/// In pretty mode a spinner line carries the per-frame status and everything
/// else is printed above it; in plain mode lines go straight to stderr. The
/// banner and the log are only printed when they change.
#[derive(Clone)]
pub struct ConsoleSurface {
    status: Option<ProgressBar>,
    snapshot: Option<PathBuf>,
    alert_active: bool,
    last_log: Vec<String>,
}

impl ConsoleSurface {
    fn print(&self, line: &str) {
        match &self.status {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    /// Stop the spinner, leaving `message` on its line.
    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.status {
            bar.finish_with_message(message.to_string());
        }
    }
}

impl ReportSink for ConsoleSurface {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
        self.print(&format!("warning: {message}"));
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
        self.print(&format!("error: {message}"));
    }
}

impl Surface for ConsoleSurface {
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) {
        let summary = if captions.is_empty() {
            format!("frame {}", frame.index)
        } else {
            format!("frame {}: {}", frame.index, captions.join(", "))
        };
        match &self.status {
            Some(bar) => bar.set_message(summary),
            None if !captions.is_empty() => eprintln!("{summary}"),
            None => log::debug!("{}", summary),
        }
        if let Some(path) = &self.snapshot {
            if let Err(e) = frame.image().save(path) {
                log::warn!("failed to write snapshot {}: {}", path.display(), e);
            }
        }
    }

    fn set_alert(&mut self, active: bool) {
        if active == self.alert_active {
            return;
        }
        self.alert_active = active;
        if active {
            self.print(ALERT_BANNER);
        } else {
            self.print("(clear)");
        }
    }

    fn show_log(&mut self, lines: &[String]) {
        if lines == self.last_log.as_slice() {
            return;
        }
        self.last_log = lines.to_vec();
        self.print("Detection Log:");
        for line in lines {
            self.print(&format!("  {line}"));
        }
    }

    fn status(&mut self, message: &str) {
        log::info!("{}", message);
        self.print(message);
    }
}
