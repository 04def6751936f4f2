use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use arcplan_blueprint::config::BlueprintConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ARCPLAN_CONFIG",
        "ARCPLAN_STRIDE",
        "ARCPLAN_INTEREST",
        "ARCPLAN_MIN_CONFIDENCE",
        "ARCPLAN_BACKEND",
        "ARCPLAN_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "sampling": { "stride": 10 },
        "filter": { "classes": ["chair", "clock"], "min_confidence": 0.3 },
        "rename": { "clock": "outlet", "tv": "screen" },
        "detector": {
            "backend": "tract",
            "model_path": "models/yolov8n.onnx",
            "input_width": 320,
            "input_height": 320
        },
        "progress_every": 0
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("ARCPLAN_CONFIG", file.path());
    std::env::set_var("ARCPLAN_STRIDE", "3");
    std::env::set_var("ARCPLAN_INTEREST", "sofa, bed");

    let cfg = BlueprintConfig::load().expect("load config");

    assert_eq!(cfg.stride, 3);
    assert_eq!(cfg.interest_classes, vec!["sofa", "bed"]);
    assert_eq!(cfg.min_confidence, 0.3);
    assert_eq!(
        cfg.rename,
        vec![
            ("clock".to_string(), "outlet".to_string()),
            ("tv".to_string(), "screen".to_string())
        ]
    );
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some(std::path::Path::new("models/yolov8n.onnx"))
    );
    assert_eq!(cfg.detector.input_width, 320);
    assert_eq!(cfg.detector.confidence_threshold, 0.25);
    assert_eq!(cfg.progress_every, 0);

    let scanner = cfg.scanner().expect("scanner");
    assert_eq!(scanner.sampler().stride(), 3);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
progress_every = 60

[sampling]
stride = 2

[filter]
classes = ["sink", "oven"]
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = BlueprintConfig::load_from(file.path()).expect("load config");

    assert_eq!(cfg.stride, 2);
    assert_eq!(cfg.interest_classes, vec!["sink", "oven"]);
    assert_eq!(cfg.rename, vec![("clock".to_string(), "outlet".to_string())]);
    assert_eq!(cfg.progress_every, 60);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARCPLAN_STRIDE", "0");
    assert!(BlueprintConfig::load().is_err());

    std::env::set_var("ARCPLAN_STRIDE", "five");
    assert!(BlueprintConfig::load().is_err());

    clear_env();
    std::env::set_var("ARCPLAN_MIN_CONFIDENCE", "2.0");
    assert!(BlueprintConfig::load().is_err());

    clear_env();
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "sampling": { "strid": 4 } }"#)
        .expect("write config");
    std::env::set_var("ARCPLAN_CONFIG", file.path());
    assert!(BlueprintConfig::load().is_err());

    clear_env();
}

#[test]
fn defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = BlueprintConfig::load().expect("load defaults");
    assert_eq!(cfg.stride, 5);
    assert!(cfg.interest_classes.iter().any(|c| c == "clock"));
    assert_eq!(cfg.detector.backend, "scripted");
}
