//! Drives one host process through a full face capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use panorig_core::{CancelToken, CaptureFace, Clock, PanoError, PanoResult, Rig};

use crate::artifacts::ArtifactSet;
use crate::detector::CompletionDetector;
use crate::host::{FinalizeOutcome, HostController};
use crate::input::{InputInjector, TriggerKey};
use crate::process::HostExit;
use crate::session::{CaptureSession, SessionStatus};

/// Why monitoring stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The frame sequence stopped changing.
    Stable,
    /// The host quit on its own.
    HostExited(HostExit),
    /// The configured monitor timeout elapsed.
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub face: String,
    pub artifacts: ArtifactSet,
    pub completion: Completion,
    pub finalize: FinalizeOutcome,
    pub history: Vec<SessionStatus>,
    pub elapsed: Duration,
}

pub struct CaptureOrchestrator {
    host: Arc<dyn HostController>,
    input: Arc<dyn InputInjector>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    store_dir: PathBuf,
}

impl CaptureOrchestrator {
    pub fn new(
        host: Arc<dyn HostController>,
        input: Arc<dyn InputInjector>,
        clock: Arc<dyn Clock>,
        store_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            input,
            clock,
            cancel: CancelToken::new(),
            store_dir: store_dir.into(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store_dir(&self) -> &PathBuf {
        &self.store_dir
    }

    /// Capture one face of `rig` into the temp store.
    ///
    /// On failure the host is terminated (best effort) and the session ends
    /// in `Failed`; nothing is retried.
    pub fn render_face(&self, rig: &Rig, face: &str) -> PanoResult<CaptureReport> {
        let face = rig.require(face)?.clone();
        let started = self.clock.now();
        let mut session = CaptureSession::new(face.name());

        match self.drive(&mut session, &face) {
            Ok((completion, finalize)) => {
                let artifacts = session.take_artifacts().ok_or_else(|| {
                    PanoError::host(face.name(), "session finished without artifacts")
                })?;
                let elapsed = self.clock.now().saturating_sub(started);
                tracing::info!(
                    face = face.name(),
                    frames = artifacts.frame_count(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "face captured"
                );
                Ok(CaptureReport {
                    face: face.name().to_string(),
                    artifacts,
                    completion,
                    finalize,
                    history: session.history().to_vec(),
                    elapsed,
                })
            }
            Err(e) => {
                let script = session
                    .script_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::error!(
                    face = face.name(),
                    state = %session.status(),
                    script = %script,
                    error = %e,
                    "capture failed"
                );
                session.fail();
                Err(e)
            }
        }
    }

    fn drive(
        &self,
        session: &mut CaptureSession,
        face: &CaptureFace,
    ) -> PanoResult<(Completion, FinalizeOutcome)> {
        let timing = self.host.timing().clone();

        self.cancel.checkpoint()?;
        session.transition(SessionStatus::Launching)?;
        self.host.purge_artifacts(face.name())?;
        let script = self.host.write_script(face)?;
        session.set_script_path(script.clone());
        if let Some(guard) = self.host.acquire_config(face)? {
            session.set_guard(guard);
        }
        let process = self.host.launch(face, &script)?;
        session.attach_process(process)?;
        self.settle(timing.launch_settle)?;
        if let Some(delay) = timing.focus_click {
            self.input.send_click()?;
            self.settle(delay)?;
        }

        self.trigger(session, SessionStatus::Seeking, TriggerKey::Seek, timing.seek_settle)?;
        self.trigger(session, SessionStatus::Unlocking, TriggerKey::Unlock, timing.unlock_settle)?;
        self.trigger(session, SessionStatus::SettingView, TriggerKey::View, timing.view_settle)?;
        self.trigger(session, SessionStatus::Recording, TriggerKey::Record, timing.record_warmup)?;

        session.transition(SessionStatus::Monitoring)?;
        let completion = self.monitor(session, face)?;

        self.cancel.checkpoint()?;
        session.transition(SessionStatus::Finalizing)?;
        let process = session
            .process_mut()
            .ok_or_else(|| PanoError::host(face.name(), "no host process attached"))?;
        let finalize = self
            .host
            .finalize(process, self.input.as_ref(), self.clock.as_ref())?;
        session.release_guard()?;

        session.transition(SessionStatus::Collecting)?;
        let artifacts = self.host.collect_artifacts(face.name(), &self.store_dir)?;
        session.set_artifacts(artifacts)?;
        session.transition(SessionStatus::Done)?;
        Ok((completion, finalize))
    }

    fn trigger(
        &self,
        session: &mut CaptureSession,
        to: SessionStatus,
        key: TriggerKey,
        settle: Duration,
    ) -> PanoResult<()> {
        self.cancel.checkpoint()?;
        session.transition(to)?;
        self.input.send_key_trigger(key)?;
        self.settle(settle)
    }

    fn settle(&self, delay: Duration) -> PanoResult<()> {
        self.cancel.checkpoint()?;
        if !delay.is_zero() {
            self.clock.sleep(delay);
        }
        Ok(())
    }

    fn monitor(&self, session: &mut CaptureSession, face: &CaptureFace) -> PanoResult<Completion> {
        let timing = self.host.timing();
        let mut detector = CompletionDetector::new(
            self.host.frame_pattern(face.name()),
            self.host.output_dirs(),
            timing.stability_threshold,
        );
        let started = self.clock.now();

        loop {
            self.cancel.checkpoint()?;

            let report = detector.poll();
            tracing::debug!(
                face = face.name(),
                files = report.files,
                streak = report.streak,
                "monitor cycle"
            );
            if report.stable {
                tracing::info!(face = face.name(), frames = report.files, "output stable");
                return Ok(Completion::Stable);
            }

            if let Some(process) = session.process_mut() {
                match process.try_exit() {
                    Ok(Some(exit)) => {
                        tracing::info!(face = face.name(), %exit, "host exited during capture");
                        return Ok(Completion::HostExited(exit));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(face = face.name(), error = %e, "exit check failed");
                    }
                }
            }

            if let Some(limit) = timing.monitor_timeout {
                if self.clock.now().saturating_sub(started) >= limit {
                    tracing::warn!(face = face.name(), "monitor timeout elapsed");
                    return Ok(Completion::TimedOut);
                }
            }

            self.clock.sleep(timing.poll_interval);
        }
    }
}
