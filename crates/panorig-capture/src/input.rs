//! Synthetic input delivered to the host window.
//!
//! Delivery is fire-and-forget: the host never acknowledges a key press, so
//! callers pace triggers with settle delays.

use std::process::{Command, Stdio};

use panorig_core::{PanoError, PanoResult};

/// The five keys bound by the control script, one per capture step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKey {
    /// Load and start the input source.
    Seek,
    /// Unlock camera clamps.
    Unlock,
    /// Rewind, pause, point the camera.
    View,
    /// Start capture and resume playback.
    Record,
    /// Stop capture and quit.
    Finalize,
}

impl TriggerKey {
    pub const ALL: [TriggerKey; 5] = [
        TriggerKey::Seek,
        TriggerKey::Unlock,
        TriggerKey::View,
        TriggerKey::Record,
        TriggerKey::Finalize,
    ];

    /// Key name as used in bind commands and by input helpers.
    pub fn key_name(self) -> &'static str {
        match self {
            TriggerKey::Seek => "F8",
            TriggerKey::Unlock => "F9",
            TriggerKey::View => "F10",
            TriggerKey::Record => "F11",
            TriggerKey::Finalize => "F12",
        }
    }
}

impl std::fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key_name())
    }
}

pub trait InputInjector: Send + Sync {
    fn send_key_trigger(&self, key: TriggerKey) -> PanoResult<()>;

    /// Click the focused window, used to give the host input focus.
    fn send_click(&self) -> PanoResult<()>;
}

/// Runs an external helper (e.g. `xdotool`) per input event.
#[derive(Debug, Clone)]
pub struct CommandInjector {
    key_command: Vec<String>,
    click_command: Vec<String>,
}

impl CommandInjector {
    /// `key_command` may contain `{key}`, replaced by the key name.
    pub fn new(key_command: Vec<String>, click_command: Vec<String>) -> PanoResult<Self> {
        if key_command.is_empty() {
            return Err(PanoError::config("host.key_command must not be empty"));
        }
        if click_command.is_empty() {
            return Err(PanoError::config("host.click_command must not be empty"));
        }
        Ok(Self {
            key_command,
            click_command,
        })
    }

    fn key_args(&self, key: TriggerKey) -> Vec<String> {
        self.key_command
            .iter()
            .map(|part| part.replace("{key}", key.key_name()))
            .collect()
    }

    fn run(argv: &[String]) -> PanoResult<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PanoError::config("empty input command"))?;
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| PanoError::Tool(format!("failed to run input helper '{}': {}", program, e)))?;
        if !status.success() {
            return Err(PanoError::Tool(format!(
                "input helper '{}' exited with {}",
                program, status
            )));
        }
        Ok(())
    }
}

impl InputInjector for CommandInjector {
    fn send_key_trigger(&self, key: TriggerKey) -> PanoResult<()> {
        tracing::debug!(key = key.key_name(), "sending key trigger");
        Self::run(&self.key_args(key))
    }

    fn send_click(&self) -> PanoResult<()> {
        tracing::debug!("sending focus click");
        Self::run(&self.click_command)
    }
}

/// Drops every event after logging it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInjector;

impl InputInjector for NullInjector {
    fn send_key_trigger(&self, key: TriggerKey) -> PanoResult<()> {
        tracing::info!(key = key.key_name(), "input disabled; key trigger dropped");
        Ok(())
    }

    fn send_click(&self) -> PanoResult<()> {
        tracing::info!("input disabled; click dropped");
        Ok(())
    }
}
