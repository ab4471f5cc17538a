/// Core error types for panorig.
use std::path::PathBuf;

/// A specialized Result type for panorig operations.
pub type PanoResult<T> = Result<T, PanoError>;

/// Top-level error type shared by capture and stitching.
#[derive(Debug, thiserror::Error)]
pub enum PanoError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid face: '{0}' is not part of the rig")]
    InvalidFace(String),

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("failed to write control script {path:?}: {source}")]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no artifacts found for face '{face}' (searched {searched:?})")]
    MissingArtifacts { face: String, searched: Vec<PathBuf> },

    #[error("missing frames for face(s): {}", .faces.join(", "))]
    MissingFace { faces: Vec<String> },

    #[error("encode failed with both encoders; hardware: {hardware}; software: {software}")]
    EncodeFailed { hardware: String, software: String },

    #[error("tool error: {0}")]
    Tool(String),

    #[error("host error for face '{face}': {message}")]
    Host { face: String, message: String },

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl PanoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PanoError::Configuration(message.into())
    }

    /// Create a layout error.
    pub fn layout(message: impl Into<String>) -> Self {
        PanoError::InvalidLayout(message.into())
    }

    /// Create a host error tagged with the face being captured.
    pub fn host(face: impl Into<String>, message: impl Into<String>) -> Self {
        PanoError::Host {
            face: face.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the whole run cannot continue.
    ///
    /// Per-face failures (missing artifacts, host or helper trouble) may be
    /// skipped by a driver that keeps going; everything else ends the run.
    pub fn is_fatal_for_run(&self) -> bool {
        !matches!(
            self,
            PanoError::MissingArtifacts { .. }
                | PanoError::Host { .. }
                | PanoError::ScriptWrite { .. }
                | PanoError::Tool(_)
                | PanoError::Io(_)
        )
    }
}
