//! Moving a face's capture output from the host's directories into the
//! temp store.

use std::path::{Path, PathBuf};

use panorig_core::naming::{audio_file_name, sort_frames};
use panorig_core::{FramePattern, PanoError, PanoResult};

/// Frames and (optional) audio of one captured face, inside the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub face: String,
    pub frames: Vec<PathBuf>,
    pub audio: Option<PathBuf>,
}

impl ArtifactSet {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Delete every frame and the audio file of one face from `dirs`.
/// Returns the number of files removed.
pub fn purge_face(
    pattern: &FramePattern,
    audio_name: &str,
    dirs: &[PathBuf],
) -> PanoResult<usize> {
    let mut removed = 0;
    for path in pattern.list_all(dirs)? {
        std::fs::remove_file(&path)?;
        removed += 1;
    }
    for dir in dirs {
        let audio = dir.join(audio_name);
        if audio.is_file() {
            std::fs::remove_file(&audio)?;
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!(face = pattern.prefix(), removed, "purged stale artifacts");
    }
    Ok(removed)
}

/// Move one face's frames and audio from `source_dirs` into `store`.
///
/// Store entries for the same face are purged first so a shorter re-capture
/// never mixes with frames from an earlier attempt.
pub fn collect_face(
    pattern: &FramePattern,
    audio_ext: &str,
    source_dirs: &[PathBuf],
    store: &Path,
) -> PanoResult<ArtifactSet> {
    let face = pattern.prefix().to_string();
    let audio_name = audio_file_name(&face, audio_ext);
    let sources = pattern.list_all(source_dirs)?;
    if sources.is_empty() {
        return Err(PanoError::MissingArtifacts {
            face,
            searched: source_dirs.to_vec(),
        });
    }

    std::fs::create_dir_all(store)?;
    purge_face(pattern, &audio_name, &[store.to_path_buf()])?;

    let mut frames = Vec::with_capacity(sources.len());
    for source in &sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = store.join(name);
        move_file(source, &dest)?;
        frames.push(dest);
    }
    sort_frames(&mut frames);

    let mut audio = None;
    for dir in source_dirs {
        let candidate = dir.join(&audio_name);
        if candidate.is_file() {
            let dest = store.join(&audio_name);
            move_file(&candidate, &dest)?;
            audio = Some(dest);
            break;
        }
    }
    if audio.is_none() {
        tracing::warn!(face = %face, "no audio captured for face");
    }

    tracing::info!(face = %face, frames = frames.len(), audio = audio.is_some(), "collected artifacts");
    Ok(ArtifactSet {
        face,
        frames,
        audio,
    })
}

/// Rename, replacing `dest`; falls back to copy + delete across filesystems.
pub fn move_file(source: &Path, dest: &Path) -> PanoResult<()> {
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    if std::fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, dest)?;
    std::fs::remove_file(source)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }

    #[test]
    fn test_collect_moves_frames_and_audio() {
        let host = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        for i in 0..3 {
            touch(host.path(), &format!("front{:04}.tga", i));
        }
        touch(host.path(), "front.wav");
        touch(host.path(), "back0000.tga");

        let set = collect_face(
            &FramePattern::new("front", "tga"),
            "wav",
            &[host.path().to_path_buf()],
            store.path(),
        )
        .unwrap();

        assert_eq!(set.frame_count(), 3);
        assert_eq!(set.frames[0], store.path().join("front0000.tga"));
        assert_eq!(set.audio, Some(store.path().join("front.wav")));
        assert!(!host.path().join("front0000.tga").exists());
        assert!(host.path().join("back0000.tga").exists());
    }

    #[test]
    fn test_collect_without_frames_fails() {
        let host = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let err = collect_face(
            &FramePattern::new("left", "tga"),
            "wav",
            &[host.path().to_path_buf()],
            store.path(),
        )
        .unwrap_err();
        assert!(matches!(err, PanoError::MissingArtifacts { ref face, .. } if face == "left"));
    }

    #[test]
    fn test_collect_replaces_stale_store_frames() {
        let host = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(store.path(), &format!("up{:04}.tga", i));
        }
        touch(store.path(), "up.wav");
        for i in 0..2 {
            touch(host.path(), &format!("up{:04}.tga", i));
        }

        let set = collect_face(
            &FramePattern::new("up", "tga"),
            "wav",
            &[host.path().to_path_buf()],
            store.path(),
        )
        .unwrap();
        assert_eq!(set.frame_count(), 2);
        assert!(!store.path().join("up0004.tga").exists());
        assert!(!store.path().join("up.wav").exists());
    }

    #[test]
    fn test_collect_from_fallback_dir() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        touch(fallback.path(), "down0000.tga");
        touch(fallback.path(), "down.wav");
        let set = collect_face(
            &FramePattern::new("down", "tga"),
            "wav",
            &[primary.path().to_path_buf(), fallback.path().to_path_buf()],
            store.path(),
        )
        .unwrap();
        assert_eq!(set.frame_count(), 1);
        assert!(set.audio.is_some());
    }

    #[test]
    fn test_purge_counts_removed() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "right0000.tga");
        touch(dir.path(), "right0001.tga");
        touch(dir.path(), "right.wav");
        let removed = purge_face(
            &FramePattern::new("right", "tga"),
            "right.wav",
            &[dir.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(removed, 3);
    }
}
