use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tempfile::NamedTempFile;

use animal_watch::{
    detect::ScriptedBackend, render::BOX_COLOR, BoundingBox, Command, Detection, Frame,
    IngestProvider, InputSource, Notifier, ReportSink, Session, SessionSettings, SessionState,
    SoundPlayer, StepOutcome, Surface, ALERT_BANNER,
};

#[derive(Default)]
struct Screen {
    warnings: Vec<String>,
    errors: Vec<String>,
    banner: Option<&'static str>,
    log: Vec<String>,
    captions: Vec<Vec<String>>,
    frames: Vec<Frame>,
}

/// Surface that records what the user would have seen.
#[derive(Clone, Default)]
struct RecordingSurface(Arc<Mutex<Screen>>);

impl ReportSink for RecordingSurface {
    fn warn(&self, message: &str) {
        self.0.lock().unwrap().warnings.push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.0.lock().unwrap().errors.push(message.to_string());
    }
}

impl Surface for RecordingSurface {
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) {
        let mut screen = self.0.lock().unwrap();
        screen.captions.push(captions.to_vec());
        screen.frames.push(frame.clone());
    }

    fn set_alert(&mut self, active: bool) {
        self.0.lock().unwrap().banner = active.then_some(ALERT_BANNER);
    }

    fn show_log(&mut self, lines: &[String]) {
        self.0.lock().unwrap().log = lines.to_vec();
    }
}

#[derive(Default)]
struct CountingPlayer {
    plays: AtomicUsize,
}

impl SoundPlayer for CountingPlayer {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn play(&self, _asset: &Path) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn det(label: &str, confidence: f32) -> Detection {
    Detection::new(
        BoundingBox::new(10, 10, 60, 60).expect("box"),
        label,
        confidence,
    )
}

fn wait_for(count: &AtomicUsize, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(2);
    while count.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    count.load(Ordering::SeqCst)
}

struct Harness {
    session: Session,
    screen: RecordingSurface,
    player: Arc<CountingPlayer>,
    _asset: Option<NamedTempFile>,
}

fn harness(location: &str, script: Vec<Vec<Detection>>, with_asset: bool) -> Harness {
    let asset = with_asset.then(|| NamedTempFile::new().expect("asset"));
    let asset_path = match &asset {
        Some(file) => file.path().to_path_buf(),
        None => std::env::temp_dir().join("animal-watch-missing-alert.mp3"),
    };
    let screen = RecordingSurface::default();
    let player = Arc::new(CountingPlayer::default());
    let notifier = Notifier::new(asset_path, player.clone(), Arc::new(screen.clone()));
    let session = Session::new(
        Box::new(IngestProvider::default()),
        Box::new(ScriptedBackend::new(script)),
        Box::new(screen.clone()),
        notifier,
        SessionSettings {
            input: Some(InputSource::file(location)),
            frame_pause: Duration::from_millis(1),
            ..SessionSettings::default()
        },
    );
    Harness {
        session,
        screen,
        player,
        _asset: asset,
    }
}

#[test]
fn horse_scenario_alerts_and_rearms() {
    let mut h = harness(
        "stub://road?frames=4",
        vec![
            vec![det("cat", 0.4), det("horse", 0.6)],
            vec![det("horse", 0.7)],
            vec![],
            vec![det("horse", 0.8)],
        ],
        true,
    );
    h.session.start();
    assert_eq!(h.session.state(), SessionState::Detecting);

    let StepOutcome::Frame(first) = h.session.step() else {
        panic!("frame 1");
    };
    assert!(first.is_alert && first.is_new);
    assert_eq!(first.label.as_deref(), Some("horse"));
    {
        let screen = h.screen.0.lock().unwrap();
        assert_eq!(screen.banner, Some(ALERT_BANNER));
        assert_eq!(screen.captions.last().unwrap(), &vec!["horse (0.60)".to_string()]);
        assert_eq!(screen.log.len(), 1);
        assert!(screen.log[0].ends_with(" - Horse Detected"));
    }

    let StepOutcome::Frame(second) = h.session.step() else {
        panic!("frame 2");
    };
    assert!(second.is_alert && !second.is_new);

    let StepOutcome::Frame(third) = h.session.step() else {
        panic!("frame 3");
    };
    assert!(!third.is_alert);
    assert_eq!(h.session.alert_state().last_alerted_label(), None);
    assert_eq!(h.screen.0.lock().unwrap().banner, None);

    let StepOutcome::Frame(fourth) = h.session.step() else {
        panic!("frame 4");
    };
    assert!(fourth.is_alert && fourth.is_new);

    assert_eq!(h.session.step(), StepOutcome::Ended);
    assert_eq!(h.session.state(), SessionState::Idle);

    let stats = h.session.stats();
    assert_eq!(stats.frames_processed, 4);
    assert_eq!(stats.alerts, 3);
    assert_eq!(stats.sounds_triggered, 2);
    assert_eq!(wait_for(&h.player.plays, 2), 2);
    assert_eq!(h.session.log().len(), 3);

    let screen = h.screen.0.lock().unwrap();
    assert_eq!(screen.warnings, vec!["Video ended or no camera input detected.".to_string()]);
    assert!(screen.errors.is_empty());
}

#[test]
fn missing_asset_warns_without_stopping_detection() {
    let mut h = harness(
        "stub://road?frames=2",
        vec![vec![det("dog", 0.9)], vec![det("cow", 0.9)]],
        false,
    );
    h.session.start();
    assert!(matches!(h.session.step(), StepOutcome::Frame(_)));
    assert!(matches!(h.session.step(), StepOutcome::Frame(_)));
    assert_eq!(h.session.stats().sounds_triggered, 2);

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let count = h
            .screen
            .0
            .lock()
            .unwrap()
            .warnings
            .iter()
            .filter(|w| w.contains("not found"))
            .count();
        if count == 2 || Instant::now() > deadline {
            assert_eq!(count, 2);
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(h.player.plays.load(Ordering::SeqCst), 0);
}

#[test]
fn unsupported_upload_stays_idle_with_warning() {
    let mut h = harness("notes.txt", vec![], true);
    h.session.start();
    assert_eq!(h.session.state(), SessionState::Idle);
    let screen = h.screen.0.lock().unwrap();
    assert_eq!(screen.warnings.len(), 1);
    assert!(screen.warnings[0].contains("notes.txt"));
}

#[test]
fn run_loop_follows_channel_commands() -> Result<()> {
    let mut h = harness(
        "stub://road?frames=3",
        vec![vec![det("zebra", 0.5)], vec![det("zebra", 0.5)]],
        true,
    );
    let (tx, rx) = mpsc::channel();
    tx.send(Command::SetThreshold(0.3))?;
    tx.send(Command::Start)?;
    tx.send(Command::Start)?;
    drop(tx);

    let stats = h.session.run(&rx)?;
    assert_eq!(h.session.threshold().value(), 0.3);
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.alerts, 2);
    assert_eq!(stats.sounds_triggered, 1);
    assert_eq!(h.session.state(), SessionState::Idle);
    Ok(())
}

#[test]
fn log_display_keeps_last_five() {
    let labels = ["dog", "cat", "cow", "elephant", "horse", "sheep", "bear"];
    let script = labels.iter().map(|l| vec![det(l, 0.9)]).collect();
    let mut h = harness("stub://road?frames=7", script, true);
    h.session.start();
    while matches!(h.session.step(), StepOutcome::Frame(_)) {}

    let screen = h.screen.0.lock().unwrap();
    let shown: Vec<&str> = screen
        .log
        .iter()
        .map(|line| line.split(" - ").nth(1).unwrap_or_default())
        .collect();
    assert_eq!(
        shown,
        vec![
            "Cow Detected",
            "Elephant Detected",
            "Horse Detected",
            "Sheep Detected",
            "Bear Detected"
        ]
    );
    assert_eq!(h.session.stats().sounds_triggered, 7);
}

#[test]
fn shown_frames_carry_caption_tabs_above_boxes() {
    let bbox = BoundingBox::new(200, 100, 400, 300).expect("box");
    let mut h = harness(
        "stub://road?frames=1",
        vec![vec![Detection::new(bbox, "giraffe", 0.8)]],
        true,
    );
    h.session.start();
    assert!(matches!(h.session.step(), StepOutcome::Frame(_)));

    let screen = h.screen.0.lock().unwrap();
    let image = screen.frames[0].image();
    let tab = (60..100)
        .flat_map(|y| (200..400).map(move |x| (x, y)))
        .filter(|&(x, y)| image.get_pixel(x, y) == &BOX_COLOR)
        .count();
    assert!(tab > 0);
    let left_of_box = (60..100)
        .flat_map(|y| (0..200).map(move |x| (x, y)))
        .filter(|&(x, y)| image.get_pixel(x, y) == &BOX_COLOR)
        .count();
    assert_eq!(left_of_box, 0);
}
