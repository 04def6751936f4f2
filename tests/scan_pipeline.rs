use anyhow::Result;

use arcplan_blueprint::{
    process_video, BlueprintEntry, BoundingBox, Detection, FileOpener, FrameSampler,
    InterestFilter, MalformedDetection, RenameRule, ScriptedBackend, VideoScanner,
};

fn det(class: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection::new(class, BoundingBox::new(x1, y1, x2, y2), 0.8).expect("valid detection")
}

fn names(entries: &[BlueprintEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn ten_frame_video_averages_two_chair_sightings() -> Result<()> {
    let mut detector = ScriptedBackend::new(vec![
        vec![det("chair", 0.0, 0.0, 100.0, 100.0)],
        vec![det("chair", 100.0, 100.0, 200.0, 200.0)],
    ]);

    let blueprint = process_video("stub://room?frames=10&width=200&height=200", &mut detector)?;

    assert_eq!(
        serde_json::to_string(&blueprint)?,
        r#"[{"name":"chair","x":0.5,"y":0.5}]"#
    );
    assert_eq!(detector.calls(), &[5, 10]);
    Ok(())
}

#[test]
fn unopenable_video_yields_empty_blueprint_without_detection() -> Result<()> {
    let mut detector = ScriptedBackend::new(vec![vec![det("chair", 0.0, 0.0, 1.0, 1.0)]]);

    let blueprint = process_video("https://example.com/room.mp4", &mut detector)?;

    assert!(blueprint.is_empty());
    assert!(detector.calls().is_empty());
    Ok(())
}

#[test]
fn video_without_qualifying_detections_is_empty() -> Result<()> {
    let mut detector = ScriptedBackend::new(vec![
        vec![det("person", 0.0, 0.0, 10.0, 10.0)],
        vec![det("car", 0.0, 0.0, 10.0, 10.0)],
    ]);

    let blueprint = process_video("stub://room?frames=12&width=64&height=48", &mut detector)?;

    assert!(blueprint.is_empty());
    Ok(())
}

#[test]
fn clock_becomes_outlet_at_clock_position() -> Result<()> {
    let mut detector = ScriptedBackend::new(vec![
        vec![det("tv", 0.0, 0.0, 10.0, 10.0)],
        vec![det("clock", 40.0, 0.0, 60.0, 20.0), det("bed", 0.0, 50.0, 100.0, 100.0)],
        vec![det("clock", 40.0, 20.0, 60.0, 40.0)],
    ]);

    let blueprint = process_video("stub://room?frames=15&width=100&height=100", &mut detector)?;

    assert_eq!(names(&blueprint), vec!["tv", "outlet", "bed"]);
    let outlet = &blueprint[1];
    assert_eq!(outlet.x, 0.5);
    assert_eq!(outlet.y, 0.2);
    Ok(())
}

#[test]
fn same_detections_in_any_order_give_same_means() -> Result<()> {
    let frames = vec![
        vec![det("sofa", 0.0, 0.0, 20.0, 20.0), det("sofa", 30.0, 10.0, 50.0, 30.0)],
        vec![det("sofa", 60.0, 60.0, 80.0, 90.0)],
    ];
    let mut reversed: Vec<Vec<Detection>> = frames
        .iter()
        .map(|frame| frame.iter().rev().cloned().collect())
        .collect();
    reversed.reverse();

    let filter = InterestFilter::new(["sofa"])?;
    let scanner = VideoScanner::new(FrameSampler::new(1)?, filter, RenameRule::identity());

    let forward = scanner.scan(
        "stub://room?frames=2&width=100&height=100",
        &FileOpener,
        &mut ScriptedBackend::new(frames),
    )?;
    let backward = scanner.scan(
        "stub://room?frames=2&width=100&height=100",
        &FileOpener,
        &mut ScriptedBackend::new(reversed),
    )?;

    assert_eq!(forward.entries().len(), 1);
    let (f, b) = (&forward.entries()[0], &backward.entries()[0]);
    assert!((f.x - b.x).abs() < 1e-12);
    assert!((f.y - b.y).abs() < 1e-12);
    assert!((f.x - 0.4).abs() < 1e-12);
    Ok(())
}

#[test]
fn repeated_scans_are_bit_identical() -> Result<()> {
    let script = || {
        ScriptedBackend::new(vec![
            vec![det("cup", 3.0, 7.0, 13.0, 21.0), det("book", 1.0, 1.0, 2.0, 9.0)],
            vec![det("cup", 5.0, 5.0, 17.0, 11.0)],
        ])
    };
    let path = "stub://kitchen?frames=10&width=33&height=17";

    let first = serde_json::to_string(&process_video(path, &mut script())?)?;
    let second = serde_json::to_string(&process_video(path, &mut script())?)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn malformed_detection_aborts_the_scan() {
    let bad = Detection {
        class_name: "chair".to_string(),
        bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        confidence: 7.0,
    };
    let mut detector = ScriptedBackend::new(vec![vec![], vec![bad]]);

    let err = process_video("stub://room?frames=20&width=64&height=64", &mut detector)
        .expect_err("malformed detection must abort");

    assert!(err.downcast_ref::<MalformedDetection>().is_some());
    assert_eq!(detector.calls(), &[5, 10]);
}

#[test]
fn custom_stride_and_min_confidence() -> Result<()> {
    let weak = Detection::new("laptop", BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.2)?;
    let strong = Detection::new("laptop", BoundingBox::new(20.0, 20.0, 30.0, 30.0), 0.9)?;
    let mut detector = ScriptedBackend::new(vec![vec![weak, strong]]);

    let scanner = VideoScanner::new(
        FrameSampler::new(3)?,
        InterestFilter::default(),
        RenameRule::default(),
    )
    .with_min_confidence(0.5);

    let blueprint = scanner.scan(
        "stub://desk?frames=7&width=50&height=50",
        &FileOpener,
        &mut detector,
    )?;

    assert_eq!(detector.calls(), &[3, 6]);
    assert_eq!(blueprint.entries().len(), 1);
    assert_eq!(blueprint.entries()[0].x, 0.5);
    assert_eq!(blueprint.stats.detections_seen, 2);
    assert_eq!(blueprint.stats.detections_kept, 1);
    Ok(())
}

#[test]
fn scripted_backend_loads_from_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("detections.json");
    std::fs::write(
        &script,
        r#"[[{"class_name": "refrigerator", "box": {"x1": 0, "y1": 0, "x2": 40, "y2": 80}, "confidence": 0.95}]]"#,
    )?;
    let mut detector = ScriptedBackend::from_json_path(&script)?;

    let blueprint = process_video("stub://kitchen?frames=5&width=80&height=80", &mut detector)?;

    assert_eq!(
        blueprint,
        vec![BlueprintEntry {
            name: "refrigerator".to_string(),
            x: 0.25,
            y: 0.5,
        }]
    );
    Ok(())
}
