//! # panorig-capture
//!
//! Drives a rendering host with no programmatic API through one face
//! capture per session: generate a control script, launch the host, press
//! trigger keys in sequence, wait for the output to stop changing, then quit
//! the host and move its output into the temp store.

pub mod artifacts;
pub mod detector;
pub mod fakes;
pub mod guard;
pub mod host;
pub mod input;
pub mod orchestrator;
pub mod process;
pub mod script;
pub mod session;

pub use artifacts::ArtifactSet;
pub use detector::{CompletionDetector, PollReport, StabilityTracker};
pub use guard::HostConfigGuard;
pub use host::{controller_for, AutoexecHost, ExecHost, FinalizeOutcome, HostController};
pub use input::{CommandInjector, InputInjector, NullInjector, TriggerKey};
pub use orchestrator::{CaptureOrchestrator, CaptureReport, Completion};
pub use process::{ChildProcess, HostExit, HostProcess};
pub use script::{ControlScript, ScriptCommand, ScriptGenerator, ScriptSettings};
pub use session::{CaptureSession, SessionStatus};
