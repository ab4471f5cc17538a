use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::angle::{AngleModel, PitchConvention};
use crate::error::{PanoError, PanoResult};
use crate::naming::FramePattern;
use crate::rig::{equirect_size, FaceLayout, Rig, MAX_OUTPUT_WIDTH};

/// Which host controller drives the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostVariant {
    /// Control script passed with `+exec` on the command line.
    #[default]
    Exec,
    /// Control script injected through the host's persistent `autoexec.cfg`.
    Autoexec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    pub variant: HostVariant,
    /// Host install directory; also the working directory of the process.
    pub root: PathBuf,
    /// Executable, relative to `root` unless absolute.
    pub executable: PathBuf,
    /// Game/mod selector; scripts go to `<root>/<mod_dir>/cfg`.
    pub mod_dir: String,
    /// Directory the engine writes captures to when it ignores `mod_dir`.
    pub fallback_dir: String,
    /// Field of view written into the script when the engine scales FOV
    /// differently from the rig (e.g. Hor+ engines).
    pub fov_override: Option<f64>,
    pub extra_args: Vec<String>,
    pub frame_format: String,
    pub audio_format: String,
    /// Also switch off post-processing in the control script.
    pub disable_post_process: bool,
    /// External helper that presses one key; `{key}` is replaced by the key name.
    pub key_command: Vec<String>,
    /// External helper that clicks the focused window.
    pub click_command: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            variant: HostVariant::Exec,
            root: PathBuf::from("C:/Games/Steam/steamapps/common/Half-Life 2"),
            executable: PathBuf::from("hl2.exe"),
            mod_dir: "hl2_complete".to_string(),
            fallback_dir: "hl2".to_string(),
            fov_override: None,
            extra_args: Vec::new(),
            frame_format: "tga".to_string(),
            audio_format: "wav".to_string(),
            disable_post_process: false,
            key_command: vec!["xdotool".into(), "key".into(), "{key}".into()],
            click_command: vec!["xdotool".into(), "click".into(), "1".into()],
        }
    }
}

impl HostConfig {
    pub fn executable_path(&self) -> PathBuf {
        if self.executable.is_absolute() {
            self.executable.clone()
        } else {
            self.root.join(&self.executable)
        }
    }

    /// Directory control scripts are written to.
    pub fn script_dir(&self) -> PathBuf {
        self.root.join(&self.mod_dir).join("cfg")
    }

    /// Every directory the host may write captures to, requested one first.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.root.join(&self.mod_dir)];
        let fallback = self.root.join(&self.fallback_dir);
        if !dirs.contains(&fallback) {
            dirs.push(fallback);
        }
        dirs
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RigConfig {
    /// Field of view of every face camera, degrees. Faces are square.
    pub field_of_view: f64,
    /// Soft-edge blending region, normalized 0.0 - 0.5.
    pub blend_width: f64,
    pub frame_rate: u32,
    /// Width and height of one face capture, pixels.
    pub face_resolution: u32,
    /// Recording replayed by the host for every face (demo name, no extension).
    pub input_source_id: String,
    /// Final video name without extension.
    pub output_name: String,
    pub pitch_convention: PitchConvention,
    pub layout: FaceLayout,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            field_of_view: 90.0,
            blend_width: 0.05,
            frame_rate: 60,
            face_resolution: 2048,
            input_source_id: "my_gameplay".to_string(),
            output_name: "final_panorama".to_string(),
            pitch_convention: PitchConvention::UpPositive,
            layout: FaceLayout::Cube,
        }
    }
}

/// Optional overrides for the per-variant capture timing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub launch_settle_ms: Option<u64>,
    pub focus_settle_ms: Option<u64>,
    pub seek_settle_ms: Option<u64>,
    pub unlock_settle_ms: Option<u64>,
    pub view_settle_ms: Option<u64>,
    pub record_warmup_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stability_threshold: Option<u32>,
    pub finalize_timeout_ms: Option<u64>,
    pub monitor_timeout_ms: Option<u64>,
    /// Convert collected frames to this image format (e.g. "jpg").
    pub transcode_to: Option<String>,
}

/// Resolved settle delays and polling parameters for one host variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTiming {
    pub launch_settle: Duration,
    /// Click the host window after launch and wait this long.
    pub focus_click: Option<Duration>,
    pub seek_settle: Duration,
    pub unlock_settle: Duration,
    pub view_settle: Duration,
    pub record_warmup: Duration,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    pub finalize_timeout: Duration,
    pub monitor_timeout: Option<Duration>,
}

impl CaptureTiming {
    /// Observed-good defaults for each host variant.
    pub fn for_variant(variant: HostVariant) -> Self {
        match variant {
            HostVariant::Exec => Self {
                launch_settle: Duration::from_secs(10),
                focus_click: None,
                seek_settle: Duration::from_secs(15),
                unlock_settle: Duration::from_secs(1),
                view_settle: Duration::from_secs(2),
                record_warmup: Duration::from_secs(5),
                poll_interval: Duration::from_secs(2),
                stability_threshold: 5,
                finalize_timeout: Duration::from_secs(10),
                monitor_timeout: None,
            },
            HostVariant::Autoexec => Self {
                launch_settle: Duration::from_secs(30),
                focus_click: Some(Duration::from_secs(1)),
                seek_settle: Duration::from_secs(15),
                unlock_settle: Duration::from_secs(1),
                view_settle: Duration::from_secs(2),
                record_warmup: Duration::from_secs(5),
                poll_interval: Duration::from_secs(2),
                stability_threshold: 20,
                finalize_timeout: Duration::from_secs(10),
                monitor_timeout: None,
            },
        }
    }

    /// Settle delays that are all zero, for dry runs and tests.
    pub fn immediate(stability_threshold: u32) -> Self {
        Self {
            launch_settle: Duration::ZERO,
            focus_click: None,
            seek_settle: Duration::ZERO,
            unlock_settle: Duration::ZERO,
            view_settle: Duration::ZERO,
            record_warmup: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            stability_threshold,
            finalize_timeout: Duration::from_millis(10),
            monitor_timeout: None,
        }
    }
}

impl CaptureConfig {
    pub fn timing(&self, variant: HostVariant) -> CaptureTiming {
        let mut t = CaptureTiming::for_variant(variant);
        let ms = Duration::from_millis;
        if let Some(v) = self.launch_settle_ms {
            t.launch_settle = ms(v);
        }
        if let Some(v) = self.focus_settle_ms {
            t.focus_click = Some(ms(v));
        }
        if let Some(v) = self.seek_settle_ms {
            t.seek_settle = ms(v);
        }
        if let Some(v) = self.unlock_settle_ms {
            t.unlock_settle = ms(v);
        }
        if let Some(v) = self.view_settle_ms {
            t.view_settle = ms(v);
        }
        if let Some(v) = self.record_warmup_ms {
            t.record_warmup = ms(v);
        }
        if let Some(v) = self.poll_interval_ms {
            t.poll_interval = ms(v);
        }
        if let Some(v) = self.stability_threshold {
            t.stability_threshold = v;
        }
        if let Some(v) = self.finalize_timeout_ms {
            t.finalize_timeout = ms(v);
        }
        if let Some(v) = self.monitor_timeout_ms {
            t.monitor_timeout = Some(ms(v));
        }
        t
    }
}

/// An ffmpeg video encoder and its quality arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EncoderProfile {
    pub codec: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl EncoderProfile {
    pub fn new(codec: impl Into<String>, args: &[&str]) -> Self {
        Self {
            codec: codec.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StitchConfig {
    pub ffmpeg_bin: PathBuf,
    /// Tried first; `None` goes straight to the software encoder.
    pub hardware_encoder: Option<EncoderProfile>,
    pub software_encoder: EncoderProfile,
    pub frame_hardware_encoder: Option<EncoderProfile>,
    pub frame_software_encoder: EncoderProfile,
    /// Face whose audio track is used; any face with audio otherwise.
    pub audio_face: Option<String>,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pixel_format: String,
    pub interpolation: String,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            hardware_encoder: Some(EncoderProfile::new(
                "hevc_nvenc",
                &["-preset", "p7", "-cq", "18"],
            )),
            software_encoder: EncoderProfile::new("libx264", &["-preset", "slow", "-crf", "18"]),
            frame_hardware_encoder: Some(EncoderProfile::new("mjpeg_nvenc", &["-q:v", "2"])),
            frame_software_encoder: EncoderProfile::new("mjpeg", &["-q:v", "2"]),
            audio_face: Some("front".to_string()),
            audio_codec: "aac".to_string(),
            audio_bitrate: "320k".to_string(),
            pixel_format: "yuv420p".to_string(),
            interpolation: "lanczos".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Collected per-face frames and audio.
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp_render_files"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Everything one capture-and-stitch run needs, loaded once and passed down.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl RunConfig {
    pub fn load_from_file(path: &Path) -> PanoResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> PanoResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PanoError::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges and that the rig layout expands.
    pub fn validate(&self) -> PanoResult<()> {
        let rig = &self.rig;
        if !(rig.field_of_view > 0.0 && rig.field_of_view < 180.0) {
            return Err(PanoError::config(format!(
                "rig.field_of_view must be in (0, 180), got {}",
                rig.field_of_view
            )));
        }
        if !(0.0..=0.5).contains(&rig.blend_width) {
            return Err(PanoError::config(format!(
                "rig.blend_width must be in [0, 0.5], got {}",
                rig.blend_width
            )));
        }
        if rig.frame_rate == 0 {
            return Err(PanoError::config("rig.frame_rate must be non-zero"));
        }
        if rig.face_resolution == 0 {
            return Err(PanoError::config("rig.face_resolution must be non-zero"));
        }
        if rig.output_name.trim().is_empty() {
            return Err(PanoError::config("rig.output_name must not be empty"));
        }
        let (width, _) = self.output_size();
        if width > MAX_OUTPUT_WIDTH {
            return Err(PanoError::config(format!(
                "output width {} for field of view {}° exceeds {}; widen the field of view or lower rig.face_resolution",
                width, rig.field_of_view, MAX_OUTPUT_WIDTH
            )));
        }
        if rig.input_source_id.trim().is_empty() {
            return Err(PanoError::config("rig.input_source_id must not be empty"));
        }
        if let Some(fov) = self.host.fov_override {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(PanoError::config(format!(
                    "host.fov_override must be in (0, 180), got {}",
                    fov
                )));
            }
        }
        let timing = self.timing();
        if timing.stability_threshold == 0 {
            return Err(PanoError::config(
                "capture.stability_threshold must be at least 1",
            ));
        }
        if timing.poll_interval.is_zero() {
            return Err(PanoError::config("capture.poll_interval_ms must be non-zero"));
        }
        self.rig()?;
        Ok(())
    }

    /// Fail with a configuration error if the host cannot be launched.
    pub fn check_host_paths(&self) -> PanoResult<()> {
        let exe = self.host.executable_path();
        if !exe.is_file() {
            return Err(PanoError::config(format!(
                "host executable not found at {}",
                exe.display()
            )));
        }
        if !self.host.root.is_dir() {
            return Err(PanoError::config(format!(
                "host root {} is not a directory",
                self.host.root.display()
            )));
        }
        Ok(())
    }

    pub fn rig(&self) -> PanoResult<Rig> {
        Rig::from_layout(
            &self.rig.layout,
            self.rig.field_of_view,
            self.rig.pitch_convention,
        )
    }

    pub fn angle_model(&self) -> AngleModel {
        AngleModel::new(self.rig.pitch_convention)
    }

    pub fn timing(&self) -> CaptureTiming {
        self.capture.timing(self.host.variant)
    }

    /// Frame format in the temp store after collection (and transcoding).
    pub fn stored_frame_format(&self) -> &str {
        self.capture
            .transcode_to
            .as_deref()
            .unwrap_or(&self.host.frame_format)
    }

    /// Frame pattern of a face inside the temp store.
    pub fn stored_pattern(&self, face: &str) -> FramePattern {
        FramePattern::new(face, self.stored_frame_format())
    }

    pub fn output_path(&self) -> PathBuf {
        self.paths
            .output_dir
            .join(format!("{}.mp4", self.rig.output_name))
    }

    pub fn output_size(&self) -> (u32, u32) {
        equirect_size(self.rig.face_resolution, self.rig.field_of_view)
    }
}
