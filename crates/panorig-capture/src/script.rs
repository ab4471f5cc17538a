//! Control-script generation in the host's console dialect.
//!
//! One script per face: it hides the HUD, then binds each [`TriggerKey`] to
//! the console commands for one capture step. The orchestrator only ever
//! presses keys; everything the host does is spelled out here.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use panorig_core::{AngleModel, CaptureFace, PanoError, PanoResult, RunConfig};

use crate::input::TriggerKey;

/// One console line, or one command inside a bind.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// `name arg arg...`
    Command { name: String, args: Vec<String> },
    /// `echo "text"`; top level only, since binds cannot nest quotes.
    Echo(String),
    /// `bind "KEY" "a; b; c"`
    Bind {
        key: TriggerKey,
        commands: Vec<ScriptCommand>,
    },
    Unbind(TriggerKey),
}

impl ScriptCommand {
    fn render_inline(&self, out: &mut String) {
        match self {
            ScriptCommand::Command { name, args } => {
                out.push_str(name);
                for arg in args {
                    out.push(' ');
                    out.push_str(arg);
                }
            }
            ScriptCommand::Echo(text) => {
                let _ = write!(out, "echo {}", text.replace('"', "'"));
            }
            ScriptCommand::Bind { key, commands } => {
                let _ = write!(out, "bind \"{}\" \"", key);
                for (i, command) in commands.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    command.render_inline(out);
                }
                out.push('"');
            }
            ScriptCommand::Unbind(key) => {
                let _ = write!(out, "unbind {}", key);
            }
        }
    }

    fn render_line(&self, out: &mut String) {
        match self {
            ScriptCommand::Echo(text) => {
                let _ = write!(out, "echo \"{}\"", text.replace('"', "'"));
            }
            other => other.render_inline(out),
        }
    }

    /// Commands bound to `key`, if this is a bind.
    pub fn bound_to(&self, key: TriggerKey) -> Option<&[ScriptCommand]> {
        match self {
            ScriptCommand::Bind { key: k, commands } if *k == key => Some(commands),
            _ => None,
        }
    }
}

fn cmd(name: &str, args: &[&str]) -> ScriptCommand {
    ScriptCommand::Command {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}

fn set(name: &str, value: impl ToString) -> ScriptCommand {
    ScriptCommand::Command {
        name: name.to_string(),
        args: vec![value.to_string()],
    }
}

/// An ordered list of commands and the file name it is written under.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlScript {
    file_name: String,
    commands: Vec<ScriptCommand>,
}

impl ControlScript {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn commands(&self) -> &[ScriptCommand] {
        &self.commands
    }

    /// Commands bound to `key`.
    pub fn binding(&self, key: TriggerKey) -> Option<&[ScriptCommand]> {
        self.commands.iter().find_map(|c| c.bound_to(key))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            command.render_line(&mut out);
            out.push('\n');
        }
        out
    }

    /// Write to `dir/<file_name>`, replacing any stale copy.
    pub fn write_to(&self, dir: &Path) -> PanoResult<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::create_dir_all(dir).map_err(|source| PanoError::ScriptWrite {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, self.render()).map_err(|source| PanoError::ScriptWrite {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote control script");
        Ok(path)
    }
}

/// Deterministic script file name for a face.
pub fn script_file_name(face: &str) -> String {
    format!("render_{}.cfg", face)
}

/// Everything the generator needs, extracted once from the run config.
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    pub angle_model: AngleModel,
    /// FOV value written to the host (rig FOV unless overridden).
    pub host_fov: f64,
    pub frame_rate: u32,
    pub input_source_id: String,
    pub frame_format: String,
    pub audio_format: String,
    pub disable_post_process: bool,
}

impl ScriptSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            angle_model: config.angle_model(),
            host_fov: config.host.fov_override.unwrap_or(config.rig.field_of_view),
            frame_rate: config.rig.frame_rate,
            input_source_id: config.rig.input_source_id.clone(),
            frame_format: config.host.frame_format.clone(),
            audio_format: config.host.audio_format.clone(),
            disable_post_process: config.host.disable_post_process,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    settings: ScriptSettings,
}

impl ScriptGenerator {
    pub fn new(settings: ScriptSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    pub fn generate(&self, face: &CaptureFace) -> ControlScript {
        let s = &self.settings;
        let fov = s.host_fov;
        let pitch = s.angle_model.to_host_pitch(face.pitch());

        let mut commands = vec![
            ScriptCommand::Echo(format!(">>> LOADING RENDER CONFIG FOR {} <<<", face.name())),
            set("sv_cheats", 1),
            set("cl_drawhud", 0),
            set("r_drawviewmodel", 0),
            set("crosshair", 0),
            set("demo_fov_override", 0),
            set("mat_vignette_enable", 0),
            set("c_thirdpersonshoulder", 0),
        ];
        if s.disable_post_process {
            commands.push(set("mat_postprocess_enable", 0));
        }
        commands.extend(TriggerKey::ALL.iter().map(|k| ScriptCommand::Unbind(*k)));

        commands.push(ScriptCommand::Bind {
            key: TriggerKey::Seek,
            commands: vec![cmd("playdemo", &[&s.input_source_id])],
        });

        let mut unlock = vec![
            set("sv_cheats", 1),
            set("mat_vsync", 0),
            set("fps_max", 0),
            set("fov", fov),
            set("cl_fov", fov),
        ];
        unlock.extend(free_camera());
        commands.push(ScriptCommand::Bind {
            key: TriggerKey::Unlock,
            commands: unlock,
        });

        let mut view = vec![
            set("demo_gototick", 1),
            cmd("demo_pause", &[]),
            set("sv_cheats", 1),
            set("fov", fov),
            set("cl_fov", fov),
        ];
        view.extend(free_camera());
        view.extend([
            set("cam_idealdist", 0),
            set("cam_idealdistright", 0),
            set("cam_idealdistup", 0),
            set("cam_collision", 0),
            set("cam_ideallag", 0),
            set("cam_snapto", 1),
            set("cam_idealpitch", pitch),
            set("cam_idealyaw", face.yaw()),
            cmd("thirdperson", &[]),
            set("demo_fov_override", 0),
        ]);
        commands.push(ScriptCommand::Bind {
            key: TriggerKey::View,
            commands: view,
        });

        commands.push(ScriptCommand::Bind {
            key: TriggerKey::Record,
            commands: vec![
                set("fov", fov),
                set("cl_fov", fov),
                set("thirdperson_mayamode", 1),
                set("host_framerate", s.frame_rate),
                cmd(
                    "startmovie",
                    &[face.name(), &s.frame_format, &s.audio_format],
                ),
                cmd("demo_resume", &[]),
            ],
        });

        commands.push(ScriptCommand::Bind {
            key: TriggerKey::Finalize,
            commands: vec![cmd("endmovie", &[]), cmd("quit", &[])],
        });

        ControlScript {
            file_name: script_file_name(face.name()),
            commands,
        }
    }
}

/// Third-person camera with every clamp opened up.
fn free_camera() -> Vec<ScriptCommand> {
    vec![
        cmd("thirdperson", &[]),
        set("thirdperson_mayamode", 1),
        set("c_thirdpersonshoulder", 0),
        set("c_mindistance", -100),
        set("c_minyaw", -360),
        set("c_maxyaw", 360),
        set("c_minpitch", -180),
        set("c_maxpitch", 180),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use panorig_core::PitchConvention;

    fn generator() -> ScriptGenerator {
        ScriptGenerator::new(ScriptSettings::from_config(&RunConfig::default()))
    }

    fn rendered(commands: &[ScriptCommand]) -> String {
        let mut out = String::new();
        for c in commands {
            c.render_inline(&mut out);
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_up_face_pitch_is_sign_adjusted() {
        let face = CaptureFace::new("up", 90.0, 0.0, 0.0);
        let script = generator().generate(&face);
        let view = rendered(script.binding(TriggerKey::View).unwrap());
        assert!(view.contains("cam_idealpitch -90\n"), "{}", view);
        assert!(view.contains("cam_idealyaw 0\n"));
        assert!(view.contains("cam_idealdist 0\n"));
        assert!(view.starts_with("demo_gototick 1\ndemo_pause\n"));
    }

    #[test]
    fn test_down_positive_rig_passes_pitch_through() {
        let mut settings = ScriptSettings::from_config(&RunConfig::default());
        settings.angle_model = AngleModel::new(PitchConvention::DownPositive);
        let face = CaptureFace::new("down", 90.0, 0.0, 0.0);
        let script = ScriptGenerator::new(settings).generate(&face);
        let view = rendered(script.binding(TriggerKey::View).unwrap());
        assert!(view.contains("cam_idealpitch 90\n"));
    }

    #[test]
    fn test_record_binding_uses_face_prefix() {
        let face = CaptureFace::new("left", 0.0, 90.0, 0.0);
        let script = generator().generate(&face);
        let record = rendered(script.binding(TriggerKey::Record).unwrap());
        assert!(record.contains("host_framerate 60\n"));
        assert!(record.contains("startmovie left tga wav\n"));
        assert!(record.ends_with("demo_resume\n"));
    }

    #[test]
    fn test_finalize_is_distinct_and_quits() {
        let script = generator().generate(&CaptureFace::new("front", 0.0, 0.0, 0.0));
        let finalize = rendered(script.binding(TriggerKey::Finalize).unwrap());
        assert_eq!(finalize, "endmovie\nquit\n");
        for key in TriggerKey::ALL {
            assert!(script.binding(key).is_some(), "{} unbound", key);
        }
    }

    #[test]
    fn test_render_dialect() {
        let script = generator().generate(&CaptureFace::new("front", 0.0, 0.0, 0.0));
        let text = script.render();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("echo \">>> LOADING RENDER CONFIG FOR front <<<\"")
        );
        assert!(text.contains("cl_drawhud 0\n"));
        assert!(text.contains("crosshair 0\n"));
        assert!(text.contains("r_drawviewmodel 0\n"));
        assert!(text.contains("unbind F12\n"));
        assert!(text.contains("bind \"F8\" \"playdemo my_gameplay\"\n"));
        assert!(text.contains("bind \"F12\" \"endmovie; quit\"\n"));
        assert!(!text.contains("mat_postprocess_enable"));
        assert_eq!(script.file_name(), "render_front.cfg");
    }

    #[test]
    fn test_fov_override() {
        let mut config = RunConfig::default();
        config.host.fov_override = Some(106.26);
        config.host.disable_post_process = true;
        let script = ScriptGenerator::new(ScriptSettings::from_config(&config))
            .generate(&CaptureFace::new("front", 0.0, 0.0, 0.0));
        let text = script.render();
        assert!(text.contains("fov 106.26;"));
        assert!(text.contains("mat_postprocess_enable 0\n"));
    }

    #[test]
    fn test_write_overwrites_stale_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join("hl2_complete").join("cfg");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("render_front.cfg"), "stale").unwrap();

        let script = generator().generate(&CaptureFace::new("front", 0.0, 0.0, 0.0));
        let path = script.write_to(&cfg_dir).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), script.render());
    }

    #[test]
    fn test_write_failure_is_script_write_error() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the directory should be
        let blocker = dir.path().join("cfg");
        std::fs::write(&blocker, "not a dir").unwrap();
        let script = generator().generate(&CaptureFace::new("front", 0.0, 0.0, 0.0));
        assert!(matches!(
            script.write_to(&blocker),
            Err(PanoError::ScriptWrite { .. })
        ));
    }
}
