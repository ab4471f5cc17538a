use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use panorig_core::{PanoError, PanoResult};

/// Lines of stderr kept when a tool run fails.
const STDERR_TAIL_LINES: usize = 20;

/// Result of one tool invocation that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let tail = stderr_tail(&self.stderr);
        if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail)
        }
    }
}

/// Runs the external transcoder with a prepared argument list.
///
/// A non-zero exit is a normal [`ToolOutput`]; only failing to start the
/// tool at all is an error.
pub trait ToolRunner: Send + Sync {
    fn run(&self, args: &[String]) -> PanoResult<ToolOutput>;
}

/// Shells out to an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    bin: PathBuf,
}

impl FfmpegRunner {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Check if the binary runs at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl ToolRunner for FfmpegRunner {
    fn run(&self, args: &[String]) -> PanoResult<ToolOutput> {
        tracing::debug!(bin = %self.bin.display(), args = ?args, "running ffmpeg");
        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                PanoError::Tool(format!(
                    "failed to start {}: {}. Install FFmpeg: https://ffmpeg.org/download.html",
                    self.bin.display(),
                    e
                ))
            })?;
        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A path as a tool argument. Non-UTF-8 paths are rejected instead of being
/// passed on with replacement characters.
pub fn path_arg(path: &Path) -> PanoResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        PanoError::config(format!(
            "path is not valid UTF-8 and cannot be passed to ffmpeg: {}",
            path.display()
        ))
    })
}

/// Last few non-empty lines of a stderr dump, joined with ` | `.
pub fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
