//! Run driver: sequences face captures, post-collection transcoding and the
//! final stitch.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use panorig_capture::CaptureOrchestrator;
use panorig_core::{CancelToken, FramePattern, PanoError, Rig, RunConfig};
use panorig_stitch::{transcode_frames, StitchEngine, StitchReport, ToolRunner};

/// Outcome of a capture pass over several faces.
#[derive(Debug, Default)]
pub struct CaptureSummary {
    pub captured: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CaptureSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Driver {
    config: RunConfig,
    rig: Rig,
    runner: Arc<dyn ToolRunner>,
    cancel: CancelToken,
}

impl Driver {
    pub fn new(config: RunConfig, runner: Arc<dyn ToolRunner>, cancel: CancelToken) -> Result<Self> {
        let rig = config.rig().context("invalid rig configuration")?;
        Ok(Self {
            config,
            rig,
            runner,
            cancel,
        })
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    /// Faces to capture: the requested ones in rig order, or all of them.
    pub fn select_faces(&self, requested: &[String]) -> Result<Vec<String>> {
        for name in requested {
            self.rig.require(name)?;
        }
        Ok(self
            .rig
            .names()
            .filter(|n| requested.is_empty() || requested.iter().any(|r| r == n))
            .map(str::to_string)
            .collect())
    }

    /// Capture `faces` one after another.
    ///
    /// Without `keep_going` the first failure ends the pass. With it, per-face
    /// failures are recorded and the pass continues; cancellation and
    /// configuration errors always stop it.
    pub fn capture(
        &self,
        orchestrator: &CaptureOrchestrator,
        faces: &[String],
        keep_going: bool,
    ) -> Result<CaptureSummary> {
        let mut summary = CaptureSummary::default();
        for (i, face) in faces.iter().enumerate() {
            self.cancel.checkpoint()?;
            tracing::info!(face = %face, index = i + 1, total = faces.len(), "capturing face");

            let result = orchestrator
                .render_face(&self.rig, face)
                .and_then(|_| self.transcode(face));
            match result {
                Ok(()) => {
                    println!("  ✓ {}", face);
                    summary.captured.push(face.clone());
                }
                Err(e) if keep_going && !e.is_fatal_for_run() => {
                    println!("  ✗ {}: {}", face, e);
                    tracing::warn!(face = %face, error = %e, "face failed; continuing");
                    summary.failed.push((face.clone(), e.to_string()));
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e))
                        .with_context(|| format!("capture failed for face '{}'", face));
                }
            }
        }
        Ok(summary)
    }

    fn transcode(&self, face: &str) -> Result<(), PanoError> {
        let Some(ext) = self.config.capture.transcode_to.as_deref() else {
            return Ok(());
        };
        let stitch = &self.config.stitch;
        transcode_frames(
            self.runner.as_ref(),
            &FramePattern::new(face, self.config.host.frame_format.as_str()),
            ext,
            &self.config.paths.temp_dir,
            stitch.frame_hardware_encoder.as_ref(),
            &stitch.frame_software_encoder,
        )
        .map(|_| ())
    }

    pub fn stitch(&self) -> Result<StitchReport> {
        self.cancel.checkpoint()?;
        let engine = StitchEngine::new(Arc::clone(&self.runner), self.config.clone());
        let report = engine
            .stitch(&self.rig, &self.config.paths.temp_dir)
            .context("stitching failed")?;
        Ok(report)
    }
}

/// Remove the temp store and everything in it.
pub fn clean_store(store: &Path) -> Result<()> {
    if store.exists() {
        std::fs::remove_dir_all(store)
            .with_context(|| format!("failed to clean temp dir: {}", store.display()))?;
        tracing::info!(store = %store.display(), "temp dir cleaned");
    }
    Ok(())
}
