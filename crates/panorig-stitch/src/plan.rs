//! Pre-flight checks and the ffmpeg command line for one stitch.

use std::path::{Path, PathBuf};

use panorig_core::naming::audio_file_name;
use panorig_core::{EncoderProfile, PanoError, PanoResult, Rig, RunConfig};

use crate::ffmpeg::path_arg;
use crate::graph::{self, GraphSettings, StitchInput, OUTPUT_LABEL};

/// The audio track chosen for the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    pub face: String,
    pub path: PathBuf,
}

/// A fully checked stitch, ready to be turned into tool arguments for any
/// video encoder.
#[derive(Debug, Clone)]
pub struct StitchPlan {
    inputs: Vec<StitchInput>,
    input_args: Vec<String>,
    audio_arg: Option<String>,
    output_arg: String,
    audio: Option<AudioInput>,
    filter: String,
    frame_rate: u32,
    audio_codec: String,
    audio_bitrate: String,
    pixel_format: String,
    output: PathBuf,
    size: (u32, u32),
}

impl StitchPlan {
    /// Check the temp store and build the plan.
    ///
    /// Every face must have at least one frame; all missing faces are
    /// reported together before any tool runs.
    pub fn prepare(config: &RunConfig, rig: &Rig, store: &Path) -> PanoResult<Self> {
        let frame_ext = config.stored_frame_format();
        let inputs = graph::stitch_inputs(rig, &config.angle_model(), frame_ext);

        let mut missing = Vec::new();
        for face in rig.names() {
            let frames = config.stored_pattern(face).list(store)?;
            if frames.is_empty() {
                missing.push(face.to_string());
            } else {
                tracing::debug!(face, frames = frames.len(), "frames present");
            }
        }
        if !missing.is_empty() {
            for face in &missing {
                tracing::error!(face = %face, store = %store.display(), "no frames for face");
            }
            return Err(PanoError::MissingFace { faces: missing });
        }

        let audio = pick_audio(
            rig,
            config.stitch.audio_face.as_deref(),
            &config.host.audio_format,
            store,
        );
        match &audio {
            Some(a) => tracing::info!(face = %a.face, path = %a.path.display(), "audio source"),
            None => tracing::warn!("no audio found for any face; output will be silent"),
        }

        let (width, height) = config.output_size();
        let settings = GraphSettings {
            field_of_view: config.rig.field_of_view,
            blend_width: config.rig.blend_width,
            interpolation: config.stitch.interpolation.clone(),
            width,
            height,
        };
        let filter = graph::build(rig, &inputs, &settings);

        let output = config.output_path();
        let input_args = inputs
            .iter()
            .map(|input| path_arg(&store.join(input.pattern.ffmpeg_pattern())))
            .collect::<PanoResult<Vec<_>>>()?;
        let audio_arg = audio.as_ref().map(|a| path_arg(&a.path)).transpose()?;
        let output_arg = path_arg(&output)?;

        Ok(Self {
            inputs,
            input_args,
            audio_arg,
            output_arg,
            audio,
            filter,
            frame_rate: config.rig.frame_rate,
            audio_codec: config.stitch.audio_codec.clone(),
            audio_bitrate: config.stitch.audio_bitrate.clone(),
            pixel_format: config.stitch.pixel_format.clone(),
            output,
            size: (width, height),
        })
    }

    pub fn inputs(&self) -> &[StitchInput] {
        &self.inputs
    }

    pub fn audio(&self) -> Option<&AudioInput> {
        self.audio.as_ref()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Full argument list for `encoder`. Only the `-c:v` section differs
    /// between encoders.
    pub fn command(&self, encoder: &EncoderProfile) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];
        let rate = self.frame_rate.to_string();
        for input in &self.input_args {
            args.extend(["-framerate".into(), rate.clone(), "-i".into(), input.clone()]);
        }
        if let Some(audio) = &self.audio_arg {
            args.extend(["-i".into(), audio.clone()]);
        }

        args.extend([
            "-filter_complex".into(),
            self.filter.clone(),
            "-map".into(),
            format!("[{}]", OUTPUT_LABEL),
        ]);
        if self.audio.is_some() {
            args.extend([
                "-map".into(),
                format!("{}:a", self.inputs.len()),
                "-c:a".into(),
                self.audio_codec.clone(),
                "-b:a".into(),
                self.audio_bitrate.clone(),
            ]);
        }

        args.extend(["-c:v".into(), encoder.codec.clone()]);
        args.extend(encoder.args.iter().cloned());
        args.extend(["-pix_fmt".into(), self.pixel_format.clone()]);
        args.push(self.output_arg.clone());
        args
    }
}

/// Configured face first, then the first face in rig order with audio.
fn pick_audio(rig: &Rig, preferred: Option<&str>, ext: &str, store: &Path) -> Option<AudioInput> {
    let candidate = |face: &str| {
        let path = store.join(audio_file_name(face, ext));
        path.is_file().then(|| AudioInput {
            face: face.to_string(),
            path,
        })
    };
    if let Some(face) = preferred.filter(|f| rig.face(f).is_some()) {
        if let Some(audio) = candidate(face) {
            return Some(audio);
        }
        tracing::warn!(face, "configured audio face has no audio; trying others");
    }
    rig.names().find_map(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panorig_core::{CaptureFace, FaceLayout};

    fn store_with(faces: &[&str], frames: u32) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for face in faces {
            for i in 0..frames {
                std::fs::write(dir.path().join(format!("{}{:04}.tga", face, i)), b"t").unwrap();
            }
        }
        dir
    }

    #[test]
    fn test_missing_faces_reported_together() {
        let config = RunConfig::default();
        let rig = config.rig().unwrap();
        let store = store_with(&["front", "right", "back", "left"], 2);
        let err = StitchPlan::prepare(&config, &rig, store.path()).unwrap_err();
        match err {
            PanoError::MissingFace { faces } => assert_eq!(faces, vec!["up", "down"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_audio_falls_back_to_first_face_with_audio() {
        let config = RunConfig::default();
        let rig = config.rig().unwrap();
        let store = store_with(&["front", "right", "back", "left", "up", "down"], 1);
        std::fs::write(store.path().join("back.wav"), b"RIFF").unwrap();
        let plan = StitchPlan::prepare(&config, &rig, store.path()).unwrap();
        assert_eq!(plan.audio().map(|a| a.face.as_str()), Some("back"));

        let args = plan.command(&config.stitch.software_encoder);
        let maps: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-map")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(maps, vec!["[outv]", "6:a"]);
    }

    #[test]
    fn test_silent_output_has_no_audio_map() {
        let config = RunConfig::default();
        let rig = config.rig().unwrap();
        let store = store_with(&["front", "right", "back", "left", "up", "down"], 1);
        let plan = StitchPlan::prepare(&config, &rig, store.path()).unwrap();
        assert!(plan.audio().is_none());
        let args = plan.command(&config.stitch.software_encoder);
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(args.last().map(String::as_str), Some("output/final_panorama.mp4"));
    }

    #[test]
    fn test_wide_cube_plan_projects_with_its_fov() {
        let mut config = RunConfig::default();
        config.rig.field_of_view = 100.0;
        config.validate().unwrap();
        let rig = config.rig().unwrap();
        let store = store_with(&["front", "right", "back", "left", "up", "down"], 1);
        let plan = StitchPlan::prepare(&config, &rig, store.path()).unwrap();
        assert!(!plan.filter().contains("c3x2"));
        assert!(plan.filter().contains("ih_fov=100:iv_fov=100"));
        assert!(plan.filter().ends_with("w=7374:h=3688[outv]"), "{}", plan.filter());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_store_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let config = RunConfig::default();
        let rig = config.rig().unwrap();
        let root = tempfile::tempdir().unwrap();
        let store = root.path().join(OsStr::from_bytes(b"temp\xff"));
        std::fs::create_dir_all(&store).unwrap();
        for face in rig.names() {
            std::fs::write(store.join(format!("{}0000.tga", face)), b"t").unwrap();
        }
        let err = StitchPlan::prepare(&config, &rig, &store).unwrap_err();
        assert!(matches!(err, PanoError::Configuration(_)), "{}", err);
    }

    #[test]
    fn test_custom_rig_uses_transcoded_extension() {
        let mut config = RunConfig::default();
        config.capture.transcode_to = Some("jpg".into());
        config.rig.layout = FaceLayout::Custom {
            faces: vec![
                CaptureFace::new("a", 0.0, 0.0, 0.0),
                CaptureFace::new("b", 0.0, 180.0, 0.0),
            ],
        };
        let rig = config.rig().unwrap();
        let store = tempfile::tempdir().unwrap();
        for face in ["a", "b"] {
            std::fs::write(store.path().join(format!("{}0000.jpg", face)), b"j").unwrap();
        }
        let plan = StitchPlan::prepare(&config, &rig, store.path()).unwrap();
        let args = plan.command(&config.stitch.software_encoder);
        assert!(args.iter().any(|a| a.ends_with("a%04d.jpg")));
        assert!(plan.filter().contains("cam_angles='0 0 0 180'"));
    }
}
