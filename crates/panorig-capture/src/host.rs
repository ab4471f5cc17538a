//! Host controllers: how a particular rendering host is prepared, launched,
//! stopped and harvested.
//!
//! Two variants exist for Source-style hosts. [`ExecHost`] passes the control
//! script on the command line with `+exec`. [`AutoexecHost`] is for engines
//! that ignore `+exec` during startup; it injects the script through the
//! persistent `autoexec.cfg` under a [`HostConfigGuard`] and needs longer
//! settle delays and a focus click.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use panorig_core::naming::audio_file_name;
use panorig_core::{
    CaptureFace, CaptureTiming, Clock, FramePattern, HostConfig, HostVariant, PanoError,
    PanoResult, RunConfig,
};

use crate::artifacts::{collect_face, purge_face, ArtifactSet};
use crate::guard::HostConfigGuard;
use crate::input::{InputInjector, TriggerKey};
use crate::process::{wait_for_exit, ChildProcess, HostExit, HostProcess};
use crate::script::{script_file_name, ScriptGenerator, ScriptSettings};

/// How the host went away after the finalize step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The host had already quit before finalize was requested.
    AlreadyExited(HostExit),
    /// The host quit after the finalize trigger.
    Exited(HostExit),
    /// The host ignored the trigger and was killed.
    Terminated,
}

pub trait HostController: Send + Sync {
    fn variant(&self) -> HostVariant;

    fn timing(&self) -> &CaptureTiming;

    /// Every directory the host may write captures to.
    fn output_dirs(&self) -> Vec<PathBuf>;

    fn frame_pattern(&self, face: &str) -> FramePattern;

    fn audio_file_name(&self, face: &str) -> String;

    /// Remove leftovers of an earlier attempt for `face` from the host's
    /// output directories.
    fn purge_artifacts(&self, face: &str) -> PanoResult<usize> {
        purge_face(
            &self.frame_pattern(face),
            &self.audio_file_name(face),
            &self.output_dirs(),
        )
    }

    /// Generate and write the face's control script; returns its path.
    fn write_script(&self, face: &CaptureFace) -> PanoResult<PathBuf>;

    /// Prepare persistent host configuration, if this variant needs it.
    fn acquire_config(&self, _face: &CaptureFace) -> PanoResult<Option<HostConfigGuard>> {
        Ok(None)
    }

    fn launch(&self, face: &CaptureFace, script: &Path) -> PanoResult<Box<dyn HostProcess>>;

    /// Ask the host to stop capturing and quit; kill it if it does not.
    fn finalize(
        &self,
        process: &mut dyn HostProcess,
        input: &dyn InputInjector,
        clock: &dyn Clock,
    ) -> PanoResult<FinalizeOutcome> {
        if let Some(exit) = process.try_exit()? {
            return Ok(FinalizeOutcome::AlreadyExited(exit));
        }
        if let Err(e) = input.send_key_trigger(TriggerKey::Finalize) {
            tracing::warn!(error = %e, "finalize trigger failed; waiting for exit anyway");
        }
        match wait_for_exit(process, self.timing().finalize_timeout, clock)? {
            Some(exit) => Ok(FinalizeOutcome::Exited(exit)),
            None => {
                tracing::warn!(
                    timeout_ms = self.timing().finalize_timeout.as_millis() as u64,
                    "host did not quit after finalize; terminating"
                );
                process.terminate()?;
                Ok(FinalizeOutcome::Terminated)
            }
        }
    }

    /// Move the face's output into `store`.
    fn collect_artifacts(&self, face: &str, store: &Path) -> PanoResult<ArtifactSet> {
        let pattern = self.frame_pattern(face);
        let audio_name = self.audio_file_name(face);
        let audio_ext = audio_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        collect_face(&pattern, &audio_ext, &self.output_dirs(), store)
    }
}

/// State shared by both Source-style variants.
#[derive(Debug, Clone)]
struct SourceHost {
    config: HostConfig,
    face_resolution: u32,
    generator: ScriptGenerator,
    timing: CaptureTiming,
}

impl SourceHost {
    fn from_config(config: &RunConfig) -> Self {
        Self {
            config: config.host.clone(),
            face_resolution: config.rig.face_resolution,
            generator: ScriptGenerator::new(ScriptSettings::from_config(config)),
            timing: config.timing(),
        }
    }

    fn frame_pattern(&self, face: &str) -> FramePattern {
        FramePattern::new(face, self.config.frame_format.as_str())
    }

    fn audio_file_name(&self, face: &str) -> String {
        audio_file_name(face, &self.config.audio_format)
    }

    fn write_script(&self, face: &CaptureFace) -> PanoResult<PathBuf> {
        self.generator
            .generate(face)
            .write_to(&self.config.script_dir())
    }

    fn base_command(&self, extra: &[&str]) -> Command {
        let res = self.face_resolution.to_string();
        let mut cmd = Command::new(self.config.executable_path());
        cmd.current_dir(&self.config.root)
            .args(["-game", self.config.mod_dir.as_str(), "-novid"])
            .args(extra)
            .args(["-window", "-w", res.as_str(), "-h", res.as_str()]);
        cmd
    }

    fn spawn(&self, face: &CaptureFace, mut cmd: Command) -> PanoResult<Box<dyn HostProcess>> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        tracing::info!(face = face.name(), command = ?cmd, "launching host");
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PanoError::config(format!(
                    "host executable not found at {}",
                    self.config.executable_path().display()
                ))
            } else {
                PanoError::host(face.name(), format!("failed to launch host: {}", e))
            }
        })?;
        Ok(Box::new(ChildProcess::new(child)))
    }
}

macro_rules! delegate_source_host {
    () => {
        fn timing(&self) -> &CaptureTiming {
            &self.base.timing
        }

        fn output_dirs(&self) -> Vec<PathBuf> {
            self.base.config.output_dirs()
        }

        fn frame_pattern(&self, face: &str) -> FramePattern {
            self.base.frame_pattern(face)
        }

        fn audio_file_name(&self, face: &str) -> String {
            self.base.audio_file_name(face)
        }

        fn write_script(&self, face: &CaptureFace) -> PanoResult<PathBuf> {
            self.base.write_script(face)
        }
    };
}

/// Passes the control script with `+exec` on the command line.
#[derive(Debug, Clone)]
pub struct ExecHost {
    base: SourceHost,
}

impl ExecHost {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            base: SourceHost::from_config(config),
        }
    }

    pub fn launch_command(&self, face: &CaptureFace) -> Command {
        let mut cmd = self.base.base_command(&[]);
        cmd.arg("+exec")
            .arg(script_file_name(face.name()))
            .args(&self.base.config.extra_args);
        cmd
    }
}

impl HostController for ExecHost {
    fn variant(&self) -> HostVariant {
        HostVariant::Exec
    }

    delegate_source_host!();

    fn launch(&self, face: &CaptureFace, _script: &Path) -> PanoResult<Box<dyn HostProcess>> {
        self.base.spawn(face, self.launch_command(face))
    }
}

/// Injects the control script through `autoexec.cfg`.
#[derive(Debug, Clone)]
pub struct AutoexecHost {
    base: SourceHost,
}

impl AutoexecHost {
    pub const AUTOEXEC: &'static str = "autoexec.cfg";

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            base: SourceHost::from_config(config),
        }
    }

    pub fn launch_command(&self, _face: &CaptureFace) -> Command {
        let mut cmd = self.base.base_command(&["-nojoy"]);
        cmd.args(&self.base.config.extra_args);
        cmd
    }

    pub fn autoexec_contents(face: &CaptureFace) -> String {
        let script = script_file_name(face.name());
        format!(
            "echo \">>> panorig autoexec: loading {} <<<\"\nexec {}\n",
            script, script
        )
    }
}

impl HostController for AutoexecHost {
    fn variant(&self) -> HostVariant {
        HostVariant::Autoexec
    }

    delegate_source_host!();

    fn acquire_config(&self, face: &CaptureFace) -> PanoResult<Option<HostConfigGuard>> {
        let target = self.base.config.script_dir().join(Self::AUTOEXEC);
        HostConfigGuard::acquire(&target, &Self::autoexec_contents(face)).map(Some)
    }

    fn launch(&self, face: &CaptureFace, _script: &Path) -> PanoResult<Box<dyn HostProcess>> {
        self.base.spawn(face, self.launch_command(face))
    }
}

/// The controller selected by `host.variant`.
pub fn controller_for(config: &RunConfig) -> PanoResult<Box<dyn HostController>> {
    let controller: Box<dyn HostController> = match config.host.variant {
        HostVariant::Exec => Box::new(ExecHost::from_config(config)),
        HostVariant::Autoexec => Box::new(AutoexecHost::from_config(config)),
    };
    tracing::debug!(variant = ?controller.variant(), "host controller selected");
    Ok(controller)
}
