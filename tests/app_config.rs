use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use animal_watch::{AppConfig, InputSource};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ANIMAL_WATCH_CONFIG",
        "ANIMAL_WATCH_THRESHOLD",
        "ANIMAL_WATCH_VIDEO",
        "ANIMAL_WATCH_WEBCAM",
        "ANIMAL_WATCH_ALERT_SOUND",
        "ANIMAL_WATCH_MODEL",
        "ANIMAL_WATCH_BACKEND",
        "ANIMAL_WATCH_FRAME_PAUSE_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");
    assert_eq!(cfg.confidence_threshold.value(), 0.5);
    assert_eq!(cfg.input, InputSource::webcam("/dev/video0"));
    assert_eq!(cfg.alert_sound, PathBuf::from("alert.mp3"));
    assert_eq!(cfg.frame_pause, Duration::from_millis(50));
    assert_eq!(cfg.detector.settings.model_path, PathBuf::from("yolov8m.onnx"));
    assert_eq!((cfg.log.display, cfg.log.capacity), (5, 1000));
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "confidence_threshold": 0.65,
            "input": { "kind": "uploaded_file", "path": "clips/road.mp4" },
            "alert_sound": "sounds/beep.mp3",
            "frame_pause_ms": 20,
            "detector": {
                "backend": "stub",
                "model_path": "models/yolov8n.onnx",
                "input_size": 320
            },
            "capture": { "target_fps": 15, "width": 1280, "height": 720 },
            "log": { "display": 3, "capacity": 50 }
        }"#,
    );

    std::env::set_var("ANIMAL_WATCH_CONFIG", file.path());
    std::env::set_var("ANIMAL_WATCH_ALERT_SOUND", "override.mp3");
    std::env::set_var("ANIMAL_WATCH_FRAME_PAUSE_MS", "5");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.confidence_threshold.value(), 0.65);
    assert_eq!(cfg.input, InputSource::file("clips/road.mp4"));
    assert_eq!(cfg.alert_sound, PathBuf::from("override.mp3"));
    assert_eq!(cfg.frame_pause, Duration::from_millis(5));
    assert_eq!(cfg.detector.backend.as_deref(), Some("stub"));
    assert_eq!(
        cfg.detector.settings.model_path,
        PathBuf::from("models/yolov8n.onnx")
    );
    assert_eq!(cfg.detector.settings.input_size, 320);
    assert_eq!(cfg.capture.target_fps, 15);
    assert_eq!((cfg.capture.width, cfg.capture.height), (1280, 720));
    assert_eq!((cfg.log.display, cfg.log.capacity), (3, 50));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
confidence_threshold = 0.4
alert_sound = "alarm.mp3"

[input]
kind = "webcam"
device = "/dev/video2"

[detector]
backend = "scripted"
script_path = "scenario.json"
"#,
    );

    let cfg = AppConfig::load_from(file.path()).expect("load toml");
    assert_eq!(cfg.confidence_threshold.value(), 0.4);
    assert_eq!(cfg.input, InputSource::webcam("/dev/video2"));
    assert_eq!(cfg.alert_sound, PathBuf::from("alarm.mp3"));
    assert_eq!(
        cfg.detector.settings.script_path,
        Some(PathBuf::from("scenario.json"))
    );
}

#[test]
fn env_input_overrides_file_input() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ANIMAL_WATCH_VIDEO", "dashcam.mov");
    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.input, InputSource::file("dashcam.mov"));

    std::env::set_var("ANIMAL_WATCH_WEBCAM", "/dev/video1");
    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.input, InputSource::webcam("/dev/video1"));

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", r#"{ "confidence_threshold": 0.1 }"#);
    std::env::set_var("ANIMAL_WATCH_CONFIG", file.path());
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("confidence threshold"));

    clear_env();
    std::env::set_var("ANIMAL_WATCH_THRESHOLD", "0.95");
    assert!(AppConfig::load().is_err());

    std::env::set_var("ANIMAL_WATCH_THRESHOLD", "lots");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("ANIMAL_WATCH_THRESHOLD"));

    clear_env();
}

#[test]
fn rejects_unknown_fields_and_bad_json() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", r#"{ "confidence": 0.5 }"#);
    assert!(AppConfig::load_from(file.path()).is_err());

    let file = write_config(".json", "{ not json");
    let err = AppConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
