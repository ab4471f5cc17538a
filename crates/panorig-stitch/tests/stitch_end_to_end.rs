use std::sync::Arc;

use panorig_core::{PanoError, RunConfig};
use panorig_stitch::fakes::{arg_value, RecordingRunner};
use panorig_stitch::{StitchEngine, CUBE_GRID_ORDER};

fn populate(store: &std::path::Path, faces: &[&str], frames: u32) {
    std::fs::create_dir_all(store).unwrap();
    for face in faces {
        for i in 0..frames {
            std::fs::write(
                store.join(format!("{}{:04}.tga", face, i)),
                format!("{} {}", face, i),
            )
            .unwrap();
        }
    }
}

fn config_in(root: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.paths.temp_dir = root.join("temp");
    config.paths.output_dir = root.join("out");
    config.rig.face_resolution = 1024;
    config
}

#[test]
fn test_cube_stitch_falls_back_to_software() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let store = config.paths.temp_dir.clone();
    populate(&store, &["front", "right", "back", "left", "up", "down"], 10);
    std::fs::write(store.join("left.wav"), b"RIFF").unwrap();

    let runner = Arc::new(RecordingRunner::new().failing_codec("hevc_nvenc"));
    let engine = StitchEngine::new(runner.clone(), config.clone());
    let rig = config.rig().unwrap();
    let report = engine.stitch(&rig, &store).unwrap();

    assert_eq!(report.encoder.encoder, "libx264");
    assert!(report.encoder.fell_back);
    assert_eq!(report.audio_face.as_deref(), Some("left"));
    assert_eq!(report.size, (4096, 2048));
    assert!(config.paths.output_dir.is_dir());

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(arg_value(&calls[0], "-c:v"), Some("hevc_nvenc"));
    let args = &calls[1];
    assert_eq!(arg_value(args, "-c:v"), Some("libx264"));

    let inputs: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "-i")
        .map(|(i, _)| &args[i + 1])
        .collect();
    assert_eq!(inputs.len(), 7);
    for (input, face) in inputs.iter().zip(CUBE_GRID_ORDER) {
        assert!(input.ends_with(&format!("{}%04d.tga", face)), "{}", input);
    }
    assert!(inputs[6].ends_with("left.wav"));

    let filter = arg_value(args, "-filter_complex").unwrap();
    assert!(filter.contains("v360=input=c3x2:output=equirect"));
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "6:a"));
    let output = config.output_path().to_string_lossy().into_owned();
    assert_eq!(args.last(), Some(&output));

    // identical command apart from the encoder section
    let strip = |c: &[String]| -> Vec<String> {
        let at = c.iter().position(|a| a == "-c:v").unwrap();
        c[..at].to_vec()
    };
    assert_eq!(strip(&calls[0]), strip(&calls[1]));
}

#[test]
fn test_missing_face_fails_before_any_tool_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let store = config.paths.temp_dir.clone();
    populate(&store, &["front", "right", "back", "left", "up"], 10);

    let runner = Arc::new(RecordingRunner::new());
    let engine = StitchEngine::new(runner.clone(), config.clone());
    let err = engine.stitch(&config.rig().unwrap(), &store).unwrap_err();
    match err {
        PanoError::MissingFace { faces } => assert_eq!(faces, vec!["down"]),
        other => panic!("unexpected error: {}", other),
    }
    assert!(runner.calls().is_empty());
}
