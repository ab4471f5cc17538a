//! # panorig-stitch
//!
//! Turns the per-face frame sequences in the temp store into one
//! equirectangular video: pre-flight checks, a projection filter graph built
//! from the rig's angles, and an ffmpeg run with encoder fallback.

pub mod encode;
pub mod fakes;
pub mod ffmpeg;
pub mod graph;
pub mod plan;
pub mod transcode;

pub use encode::{run_with_fallback, EncodeOutcome, StitchEngine, StitchReport};
pub use ffmpeg::{path_arg, FfmpegRunner, ToolOutput, ToolRunner};
pub use graph::{GraphSettings, StitchInput, CUBE_GRID_ORDER};
pub use plan::{AudioInput, StitchPlan};
pub use transcode::{transcode_frames, TranscodeReport};
