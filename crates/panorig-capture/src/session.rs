//! Per-face capture session state.

use std::path::PathBuf;

use panorig_core::{PanoError, PanoResult};

use crate::artifacts::ArtifactSet;
use crate::guard::HostConfigGuard;
use crate::process::HostProcess;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Pending,
    Launching,
    Seeking,
    Unlocking,
    SettingView,
    Recording,
    Monitoring,
    Finalizing,
    Collecting,
    Done,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Done | SessionStatus::Failed)
    }

    /// The only forward step allowed from this state.
    fn next(self) -> Option<SessionStatus> {
        use SessionStatus::*;
        match self {
            Pending => Some(Launching),
            Launching => Some(Seeking),
            Seeking => Some(Unlocking),
            Unlocking => Some(SettingView),
            SettingView => Some(Recording),
            Recording => Some(Monitoring),
            Monitoring => Some(Finalizing),
            Finalizing => Some(Collecting),
            Collecting => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SessionStatus::Failed || self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Launching => "launching",
            SessionStatus::Seeking => "seeking",
            SessionStatus::Unlocking => "unlocking",
            SessionStatus::SettingView => "setting_view",
            SessionStatus::Recording => "recording",
            SessionStatus::Monitoring => "monitoring",
            SessionStatus::Finalizing => "finalizing",
            SessionStatus::Collecting => "collecting",
            SessionStatus::Done => "done",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one render call. Owns the host process and the config
/// guard; both are released when the session ends.
pub struct CaptureSession {
    face: String,
    status: SessionStatus,
    history: Vec<SessionStatus>,
    process: Option<Box<dyn HostProcess>>,
    script_path: Option<PathBuf>,
    artifacts: Option<ArtifactSet>,
    guard: Option<HostConfigGuard>,
}

impl CaptureSession {
    pub fn new(face: impl Into<String>) -> Self {
        Self {
            face: face.into(),
            status: SessionStatus::Pending,
            history: vec![SessionStatus::Pending],
            process: None,
            script_path: None,
            artifacts: None,
            guard: None,
        }
    }

    pub fn face(&self) -> &str {
        &self.face
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Every state visited, in order, starting with `Pending`.
    pub fn history(&self) -> &[SessionStatus] {
        &self.history
    }

    pub fn transition(&mut self, to: SessionStatus) -> PanoResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(PanoError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        tracing::info!(face = %self.face, from = %self.status, to = %to, "session transition");
        self.status = to;
        self.history.push(to);
        Ok(())
    }

    /// Attach the launched host. A session never holds two.
    pub fn attach_process(&mut self, process: Box<dyn HostProcess>) -> PanoResult<()> {
        if self.process.is_some() {
            return Err(PanoError::host(
                self.face.clone(),
                "session already holds a host process",
            ));
        }
        self.process = Some(process);
        Ok(())
    }

    pub fn process_mut(&mut self) -> Option<&mut (dyn HostProcess + 'static)> {
        self.process.as_deref_mut()
    }

    pub fn set_script_path(&mut self, path: PathBuf) {
        self.script_path = Some(path);
    }

    pub fn script_path(&self) -> Option<&PathBuf> {
        self.script_path.as_ref()
    }

    pub fn set_guard(&mut self, guard: HostConfigGuard) {
        self.guard = Some(guard);
    }

    /// Record the collected output; only a `Collecting` session has any.
    pub fn set_artifacts(&mut self, artifacts: ArtifactSet) -> PanoResult<()> {
        if self.status != SessionStatus::Collecting {
            return Err(PanoError::host(
                self.face.clone(),
                format!("artifacts recorded while {}", self.status),
            ));
        }
        self.artifacts = Some(artifacts);
        Ok(())
    }

    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }

    pub fn take_artifacts(&mut self) -> Option<ArtifactSet> {
        self.artifacts.take()
    }

    /// Kill a still-running host. Errors are logged, never returned.
    pub fn terminate_host(&mut self) {
        let Some(process) = self.process.as_deref_mut() else {
            return;
        };
        match process.try_exit() {
            Ok(Some(_)) => {}
            _ => {
                tracing::warn!(face = %self.face, "terminating host");
                if let Err(e) = process.terminate() {
                    tracing::error!(face = %self.face, error = %e, "failed to terminate host");
                }
            }
        }
    }

    /// Restore the host config now rather than at drop.
    pub fn release_guard(&mut self) -> PanoResult<()> {
        match self.guard.take() {
            Some(guard) => guard.release(),
            None => Ok(()),
        }
    }

    /// Move to `Failed` from any non-terminal state, stopping the host.
    pub fn fail(&mut self) {
        self.terminate_host();
        if self.status.can_transition_to(SessionStatus::Failed) {
            let _ = self.transition(SessionStatus::Failed);
        }
        if let Err(e) = self.release_guard() {
            tracing::error!(face = %self.face, error = %e, "failed to restore host config");
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("face", &self.face)
            .field("status", &self.status)
            .field("history", &self.history)
            .field("has_process", &self.process.is_some())
            .field("script_path", &self.script_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedProcess;
    use std::sync::atomic::Ordering;

    const FORWARD: [SessionStatus; 9] = [
        SessionStatus::Launching,
        SessionStatus::Seeking,
        SessionStatus::Unlocking,
        SessionStatus::SettingView,
        SessionStatus::Recording,
        SessionStatus::Monitoring,
        SessionStatus::Finalizing,
        SessionStatus::Collecting,
        SessionStatus::Done,
    ];

    #[test]
    fn test_full_forward_path() {
        let mut s = CaptureSession::new("front");
        for to in FORWARD {
            s.transition(to).unwrap();
        }
        assert_eq!(s.history().len(), 10);
        assert!(s.status().is_terminal());
    }

    #[test]
    fn test_rejects_skipping_states() {
        let mut s = CaptureSession::new("front");
        let err = s.transition(SessionStatus::Recording).unwrap_err();
        assert!(matches!(err, PanoError::InvalidTransition { .. }));
        assert_eq!(s.status(), SessionStatus::Pending);
    }

    #[test]
    fn test_failed_reachable_from_every_non_terminal() {
        let mut states = vec![SessionStatus::Pending];
        states.extend(&FORWARD[..8]);
        for state in states {
            assert!(state.can_transition_to(SessionStatus::Failed), "{}", state);
        }
        assert!(!SessionStatus::Done.can_transition_to(SessionStatus::Failed));
        assert!(!SessionStatus::Failed.can_transition_to(SessionStatus::Pending));
    }

    #[test]
    fn test_never_holds_two_processes() {
        let mut s = CaptureSession::new("up");
        s.attach_process(Box::new(ScriptedProcess::never_exits())).unwrap();
        let err = s
            .attach_process(Box::new(ScriptedProcess::never_exits()))
            .unwrap_err();
        assert!(matches!(err, PanoError::Host { .. }));
    }

    #[test]
    fn test_fail_terminates_running_host() {
        let mut s = CaptureSession::new("down");
        let process = ScriptedProcess::never_exits();
        let terminated = process.terminated_flag();
        s.attach_process(Box::new(process)).unwrap();
        s.transition(SessionStatus::Launching).unwrap();
        s.fail();
        assert!(terminated.load(Ordering::SeqCst));
        assert_eq!(s.status(), SessionStatus::Failed);
    }

    #[test]
    fn test_artifacts_only_recorded_while_collecting() {
        let set = ArtifactSet {
            face: "back".into(),
            frames: vec![PathBuf::from("back0000.tga")],
            audio: None,
        };
        let mut s = CaptureSession::new("back");
        assert!(s.set_artifacts(set.clone()).is_err());
        for to in &FORWARD[..8] {
            s.transition(*to).unwrap();
        }
        s.set_artifacts(set.clone()).unwrap();
        assert_eq!(s.artifacts(), Some(&set));
        assert_eq!(s.take_artifacts(), Some(set));
        assert!(s.artifacts().is_none());
    }

    #[test]
    fn test_fail_restores_guard() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("autoexec.cfg");
        std::fs::write(&target, "mine").unwrap();
        let mut s = CaptureSession::new("left");
        s.set_guard(HostConfigGuard::acquire(&target, "theirs").unwrap());
        s.fail();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "mine");
    }
}
