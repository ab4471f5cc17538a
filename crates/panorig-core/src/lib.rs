//! # panorig-core
//!
//! Core types shared by every panorig crate: rig geometry and the rig →
//! projection angle transform, artifact naming, run configuration, the error
//! taxonomy, content hashing, and the clock/cancellation primitives that
//! capture sessions wait on.

pub mod angle;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod naming;
pub mod rig;

pub use config::*;

pub use angle::{AngleModel, PitchConvention, ProjectionAngle};
pub use cancel::CancelToken;
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use error::{PanoError, PanoResult};
pub use hash::ContentHash;
pub use naming::FramePattern;
pub use rig::{CaptureFace, FaceLayout, Rig, RingLayout};
