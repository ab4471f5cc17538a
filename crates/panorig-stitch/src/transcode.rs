//! Converting a collected frame sequence to another image format.

use std::path::Path;

use panorig_core::{EncoderProfile, FramePattern, PanoError, PanoResult};

use crate::encode::{run_with_fallback, EncodeOutcome};
use crate::ffmpeg::{path_arg, ToolRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReport {
    pub face: String,
    pub frames: usize,
    pub encoder: Option<EncodeOutcome>,
}

/// Re-encode `source` frames in `store` as `target_ext`, numbering kept, and
/// delete the originals once the conversion succeeded.
pub fn transcode_frames(
    runner: &dyn ToolRunner,
    source: &FramePattern,
    target_ext: &str,
    store: &Path,
    hardware: Option<&EncoderProfile>,
    software: &EncoderProfile,
) -> PanoResult<TranscodeReport> {
    let target = source.with_ext(target_ext);
    let face = source.prefix().to_string();
    let originals = source.list(store)?;
    if target.ext() == source.ext() {
        return Ok(TranscodeReport {
            face,
            frames: originals.len(),
            encoder: None,
        });
    }
    if originals.is_empty() {
        return Err(PanoError::MissingArtifacts {
            face,
            searched: vec![store.to_path_buf()],
        });
    }

    let input = path_arg(&store.join(source.ffmpeg_pattern()))?;
    let output = path_arg(&store.join(target.ffmpeg_pattern()))?;

    // a longer earlier capture would leave its tail behind `-y`
    let stale = target.list(store)?;
    for path in &stale {
        std::fs::remove_file(path)?;
    }
    if !stale.is_empty() {
        tracing::debug!(face = %face, removed = stale.len(), "removed stale transcoded frames");
    }

    let first_index = originals
        .first()
        .and_then(|p| p.file_name())
        .and_then(|n| source.frame_index(&n.to_string_lossy()))
        .unwrap_or(0);
    tracing::info!(face = %face, frames = originals.len(), to = target.ext(), "transcoding frames");

    let encoder = run_with_fallback(runner, hardware, software, |profile| {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-start_number".into(),
            first_index.to_string(),
            "-i".into(),
            input.clone(),
            "-c:v".into(),
            profile.codec.clone(),
        ];
        args.extend(profile.args.iter().cloned());
        args.extend([
            "-start_number".into(),
            first_index.to_string(),
            output.clone(),
        ]);
        args
    })?;

    let converted = target.list(store)?.len();
    if converted == 0 {
        return Err(PanoError::Tool(format!(
            "transcoding {} produced no {} frames",
            face,
            target.ext()
        )));
    }
    for path in &originals {
        std::fs::remove_file(path)?;
    }
    Ok(TranscodeReport {
        face,
        frames: converted,
        encoder: Some(encoder),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{arg_value, RecordingRunner};

    fn profiles() -> (EncoderProfile, EncoderProfile) {
        (
            EncoderProfile::new("mjpeg_nvenc", &["-q:v", "2"]),
            EncoderProfile::new("mjpeg", &["-q:v", "2"]),
        )
    }

    #[test]
    fn test_transcode_falls_back_and_removes_sources() {
        let store = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(store.path().join(format!("front{:04}.tga", i)), b"t").unwrap();
        }
        let dir = store.path().to_path_buf();
        let runner = RecordingRunner::new()
            .failing_codec("mjpeg_nvenc")
            .on_success(move |_| {
                for i in 0..3 {
                    std::fs::write(dir.join(format!("front{:04}.jpg", i)), b"j").unwrap();
                }
            });
        let (hw, sw) = profiles();
        let report = transcode_frames(
            &runner,
            &FramePattern::new("front", "tga"),
            "jpg",
            store.path(),
            Some(&hw),
            &sw,
        )
        .unwrap();

        assert_eq!(report.frames, 3);
        assert!(report.encoder.unwrap().fell_back);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(arg_value(&calls[1], "-c:v"), Some("mjpeg"));
        assert!(calls[1].last().unwrap().ends_with("front%04d.jpg"));
        assert!(!store.path().join("front0000.tga").exists());
    }

    #[test]
    fn test_recapture_replaces_every_transcoded_frame() {
        let store = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(store.path().join(format!("front{:04}.jpg", i)), b"old").unwrap();
        }
        for i in 0..2 {
            std::fs::write(store.path().join(format!("front{:04}.tga", i)), b"t").unwrap();
        }
        let dir = store.path().to_path_buf();
        let runner = RecordingRunner::new().on_success(move |_| {
            for i in 0..2 {
                std::fs::write(dir.join(format!("front{:04}.jpg", i)), b"new").unwrap();
            }
        });
        let (_, sw) = profiles();
        let report = transcode_frames(
            &runner,
            &FramePattern::new("front", "tga"),
            "jpg",
            store.path(),
            None,
            &sw,
        )
        .unwrap();

        assert_eq!(report.frames, 2);
        let jpgs = FramePattern::new("front", "jpg").list(store.path()).unwrap();
        assert_eq!(jpgs.len(), 2);
        for path in jpgs {
            assert_eq!(std::fs::read(path).unwrap(), b"new");
        }
    }

    #[test]
    fn test_same_format_is_noop() {
        let store = tempfile::tempdir().unwrap();
        std::fs::write(store.path().join("up0000.tga"), b"t").unwrap();
        let runner = RecordingRunner::new();
        let (hw, sw) = profiles();
        let report = transcode_frames(
            &runner,
            &FramePattern::new("up", "tga"),
            "TGA",
            store.path(),
            Some(&hw),
            &sw,
        )
        .unwrap();
        assert_eq!(report.frames, 1);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_sources_kept_when_both_encoders_fail() {
        let store = tempfile::tempdir().unwrap();
        std::fs::write(store.path().join("left0000.tga"), b"t").unwrap();
        let runner = RecordingRunner::new()
            .failing_codec("mjpeg_nvenc")
            .failing_codec("mjpeg");
        let (hw, sw) = profiles();
        let err = transcode_frames(
            &runner,
            &FramePattern::new("left", "tga"),
            "jpg",
            store.path(),
            Some(&hw),
            &sw,
        )
        .unwrap_err();
        assert!(matches!(err, PanoError::EncodeFailed { .. }));
        assert!(store.path().join("left0000.tga").exists());
    }
}
