//! demo - end-to-end synthetic run for animal_watch
//!
//! Replays a short scripted clip through the real session: a synthetic
//! `stub://` video and a scripted detector stand in for the file decoder and
//! the model.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use animal_watch::{
    detect::ScriptedBackend,
    notify::{default_player, DEFAULT_ALERT_SOUND},
    ui::Ui,
    BoundingBox, Detection, IngestProvider, InputSource, Notifier, Session, SessionSettings,
    StepOutcome, Threshold,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Alert sound asset (a missing file is reported, not fatal).
    #[arg(long, default_value = DEFAULT_ALERT_SOUND)]
    alert_sound: PathBuf,
    /// Confidence threshold.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
    /// Pause between frames in milliseconds.
    #[arg(long, default_value_t = 250)]
    pause_ms: u64,
    /// Write the latest annotated frame to this JPEG.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
}

fn det(label: &str, confidence: f32, x: i32) -> Result<Detection> {
    let bbox = BoundingBox::new(x, 120, x + 160, 300).ok_or_else(|| anyhow!("bad demo box"))?;
    Ok(Detection::new(bbox, label, confidence))
}

/// Cat below threshold plus a horse, the horse again, an empty frame, then
/// the horse once more.
fn scenario() -> Result<Vec<Vec<Detection>>> {
    Ok(vec![
        vec![det("cat", 0.4, 40)?, det("horse", 0.6, 300)?],
        vec![det("horse", 0.7, 310)?],
        vec![],
        vec![det("horse", 0.8, 320)?],
    ])
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let threshold = Threshold::new(args.threshold)?;
    let script = scenario()?;
    let frames = script.len();

    let ui = Ui::from_args(Some("plain"), false, true);
    let surface = ui.console(args.snapshot.clone());
    let notifier = Notifier::new(
        args.alert_sound.clone(),
        default_player(),
        Arc::new(surface.clone()),
    );
    let mut session = Session::new(
        Box::new(IngestProvider::default()),
        Box::new(ScriptedBackend::new(script)),
        Box::new(surface),
        notifier,
        SessionSettings {
            threshold,
            input: Some(InputSource::file(format!("stub://demo?frames={frames}"))),
            frame_pause: Duration::from_millis(args.pause_ms),
            ..SessionSettings::default()
        },
    );

    session.start();
    loop {
        match session.step() {
            StepOutcome::Frame(decision) => {
                println!(
                    "alert={} label={} new={}",
                    decision.is_alert,
                    decision.label.as_deref().unwrap_or("-"),
                    decision.is_new
                );
                std::thread::sleep(Duration::from_millis(args.pause_ms));
            }
            StepOutcome::Ended | StepOutcome::Idle => break,
            StepOutcome::Failed => return Err(anyhow!("detector failed during demo")),
        }
    }

    let stats = session.stats();
    println!(
        "demo complete: frames={}, alerts={}, sounds={}, log entries={}",
        stats.frames_processed,
        stats.alerts,
        stats.sounds_triggered,
        session.log().len()
    );
    // Let detached playback threads report before exit.
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}
