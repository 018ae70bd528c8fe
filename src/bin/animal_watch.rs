//! animal_watch - road-side animal detection alerts
//!
//! This binary:
//! 1. Loads configuration (file, `ANIMAL_WATCH_*` env, then CLI flags)
//! 2. Builds the detector backend
//! 3. Reads interactive commands from stdin and Ctrl-C
//! 4. Runs the detection session until `quit` or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use animal_watch::{
    config::Threshold, notify::default_player, ui::Ui, AppConfig, BackendRegistry, Command,
    IngestProvider, InputSource, Notifier, Session, SessionSettings,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ANIMAL_WATCH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Watch an uploaded video file (mp4, avi, mov).
    #[arg(long, value_name = "PATH", conflicts_with = "webcam")]
    video: Option<PathBuf>,
    /// Watch a webcam device.
    #[arg(long, value_name = "DEVICE")]
    webcam: Option<String>,
    /// Confidence threshold (0.25 - 0.9).
    #[arg(long)]
    threshold: Option<f32>,
    /// Alert sound asset.
    #[arg(long, value_name = "PATH")]
    alert_sound: Option<PathBuf>,
    /// Detector backend name (see --list-backends).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model for the tract backend.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
    /// Detection script for the scripted backend.
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,
    /// Write the latest annotated frame to this JPEG.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
    /// TrueType font for captions drawn onto frames.
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,
    /// UI mode for stderr output (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
    /// Start detecting immediately.
    #[arg(long)]
    autostart: bool,
    /// List the detector backends in this build and exit.
    #[arg(long)]
    list_backends: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let registry = BackendRegistry::with_builtin();
    if args.list_backends {
        for name in registry.list() {
            let marker = if registry.default_name() == Some(name) {
                " (default)"
            } else {
                ""
            };
            println!("{name}{marker}");
        }
        return Ok(());
    }

    let is_tty = std::io::stderr().is_terminal();
    let stdin_is_tty = std::io::stdin().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdin_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match &args.config {
            Some(path) => AppConfig::load_from(path)?,
            None => AppConfig::load()?,
        };
        apply_args(&mut cfg, &args)?;
        cfg.validate()?;
        cfg
    };
    log::info!(
        "input={}, threshold={}, alert_sound={}",
        cfg.input,
        cfg.confidence_threshold,
        cfg.alert_sound.display()
    );

    let detector = {
        let _stage = ui.stage("Load detector");
        registry.build(cfg.detector.backend.as_deref(), &cfg.detector.settings)?
    };

    let surface = ui.console(cfg.snapshot_path.clone());
    let notifier = Notifier::new(
        cfg.alert_sound.clone(),
        default_player(),
        Arc::new(surface.clone()),
    );
    let provider = IngestProvider {
        target_fps: cfg.capture.target_fps,
        width: cfg.capture.width,
        height: cfg.capture.height,
    };
    let mut session = Session::new(
        Box::new(provider),
        detector,
        Box::new(surface.clone()),
        notifier,
        SessionSettings::from_config(&cfg),
    );

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Shutdown);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    if args.autostart {
        tx.send(Command::Start)?;
    }
    spawn_command_reader(tx)?;

    log::info!("animal_watch ready. commands: start, stop, threshold <v>, video <path>, webcam [device], quit");
    let stats = session.run(&rx)?;
    drop(session);

    let summary = format!(
        "runs={}, frames={}, alerts={}, sounds={}",
        stats.runs, stats.frames_processed, stats.alerts, stats.sounds_triggered
    );
    surface.finish(&summary);
    log::info!("animal_watch stopped: {}", summary);
    Ok(())
}

fn apply_args(cfg: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(value) = args.threshold {
        cfg.confidence_threshold = Threshold::new(value)?;
    }
    if let Some(path) = &args.video {
        cfg.input = InputSource::file(path.clone());
    }
    if let Some(device) = &args.webcam {
        cfg.input = InputSource::webcam(device.clone());
    }
    if let Some(path) = &args.alert_sound {
        cfg.alert_sound = path.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = Some(backend.clone());
    }
    if let Some(path) = &args.model {
        cfg.detector.settings.model_path = path.clone();
    }
    if let Some(path) = &args.script {
        cfg.detector.settings.script_path = Some(path.clone());
        if cfg.detector.backend.is_none() {
            cfg.detector.backend = Some("scripted".to_string());
        }
    }
    if let Some(path) = &args.snapshot {
        cfg.snapshot_path = Some(path.clone());
    }
    if let Some(path) = &args.font {
        cfg.caption_font = Some(path.clone());
    }
    Ok(())
}

/// Forward stdin lines as commands. The thread ends at EOF.
fn spawn_command_reader(tx: mpsc::Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            log::debug!("stdin closed; no more interactive commands");
        })?;
    Ok(())
}
