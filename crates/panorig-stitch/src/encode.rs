//! Running a stitch plan with hardware → software encoder fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use panorig_core::{EncoderProfile, PanoError, PanoResult, Rig, RunConfig};

use crate::ffmpeg::ToolRunner;
use crate::plan::StitchPlan;

/// Which encoder produced the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutcome {
    pub encoder: String,
    /// The hardware encoder was tried and failed.
    pub fell_back: bool,
}

/// Run `build(encoder)` with the hardware encoder, then the software one.
///
/// Returns `EncodeFailed` with both error texts only when both fail. With no
/// hardware encoder configured, the software encoder runs alone.
pub fn run_with_fallback(
    runner: &dyn ToolRunner,
    hardware: Option<&EncoderProfile>,
    software: &EncoderProfile,
    build: impl Fn(&EncoderProfile) -> Vec<String>,
) -> PanoResult<EncodeOutcome> {
    let mut hardware_error = String::from("hardware encoding disabled");
    if let Some(hw) = hardware {
        match runner.run(&build(hw)) {
            Ok(out) if out.success => {
                return Ok(EncodeOutcome {
                    encoder: hw.codec.clone(),
                    fell_back: false,
                });
            }
            Ok(out) => hardware_error = out.describe(),
            Err(e) => hardware_error = e.to_string(),
        }
        tracing::warn!(
            encoder = %hw.codec,
            error = %hardware_error,
            fallback = %software.codec,
            "hardware encoder failed; retrying with software encoder"
        );
    }

    let software_error = match runner.run(&build(software)) {
        Ok(out) if out.success => {
            return Ok(EncodeOutcome {
                encoder: software.codec.clone(),
                fell_back: hardware.is_some(),
            });
        }
        Ok(out) => out.describe(),
        Err(e) => e.to_string(),
    };
    Err(PanoError::EncodeFailed {
        hardware: hardware_error,
        software: software_error,
    })
}

#[derive(Debug, Clone)]
pub struct StitchReport {
    pub output: PathBuf,
    pub encoder: EncodeOutcome,
    pub inputs: usize,
    pub audio_face: Option<String>,
    pub size: (u32, u32),
}

/// Stitches the temp store into the final video.
pub struct StitchEngine {
    runner: Arc<dyn ToolRunner>,
    config: RunConfig,
}

impl StitchEngine {
    pub fn new(runner: Arc<dyn ToolRunner>, config: RunConfig) -> Self {
        Self { runner, config }
    }

    pub fn stitch(&self, rig: &Rig, store: &Path) -> PanoResult<StitchReport> {
        tracing::info!(faces = rig.len(), store = %store.display(), "starting stitch");
        let plan = StitchPlan::prepare(&self.config, rig, store)?;

        if let Some(parent) = plan.output().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let stitch = &self.config.stitch;
        let encoder = run_with_fallback(
            self.runner.as_ref(),
            stitch.hardware_encoder.as_ref(),
            &stitch.software_encoder,
            |profile| plan.command(profile),
        )?;

        let (width, height) = plan.size();
        tracing::info!(
            output = %plan.output().display(),
            encoder = %encoder.encoder,
            width,
            height,
            "stitch complete"
        );
        Ok(StitchReport {
            output: plan.output().to_path_buf(),
            encoder,
            inputs: plan.inputs().len(),
            audio_face: plan.audio().map(|a| a.face.clone()),
            size: plan.size(),
        })
    }
}
