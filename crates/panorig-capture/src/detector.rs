//! Completion detection by observing output files.
//!
//! The host never says when the input source has finished playing. The
//! detector watches the frame sequence instead: while capture is running,
//! new frames keep appearing, so the second-to-last frame keeps changing.
//! Once its content hash has been the same for `threshold` consecutive polls,
//! the capture is considered finished.

use std::path::PathBuf;

use panorig_core::hash::hash_file;
use panorig_core::FramePattern;

/// Counts consecutive identical observations.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    threshold: u32,
    last: Option<String>,
    streak: u32,
}

impl StabilityTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last: None,
            streak: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Record one observation. Returns `true` exactly when the streak
    /// reaches the threshold.
    pub fn observe(&mut self, identity: &str) -> bool {
        if self.last.as_deref() == Some(identity) {
            self.streak += 1;
        } else {
            self.last = Some(identity.to_string());
            self.streak = 1;
        }
        self.streak == self.threshold
    }

    /// Forget the previous observation (e.g. fewer than two files present).
    pub fn reset(&mut self) {
        self.last = None;
        self.streak = 0;
    }
}

/// Outcome of one detector poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub files: usize,
    /// The file whose hash was recorded, if any.
    pub inspected: Option<PathBuf>,
    pub streak: u32,
    pub stable: bool,
}

/// Watches one face's frame sequence across the host's output directories.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    pattern: FramePattern,
    search_dirs: Vec<PathBuf>,
    tracker: StabilityTracker,
}

impl CompletionDetector {
    pub fn new(pattern: FramePattern, search_dirs: Vec<PathBuf>, threshold: u32) -> Self {
        Self {
            pattern,
            search_dirs,
            tracker: StabilityTracker::new(threshold),
        }
    }

    pub fn pattern(&self) -> &FramePattern {
        &self.pattern
    }

    /// Count of matching files right now; listing errors count as zero.
    pub fn count(&self) -> usize {
        self.pattern
            .list_all(&self.search_dirs)
            .map(|f| f.len())
            .unwrap_or(0)
    }

    /// One observation. Transient filesystem errors skip the cycle without
    /// touching the streak, so a poll never fails.
    pub fn poll(&mut self) -> PollReport {
        let files = match self.pattern.list_all(&self.search_dirs) {
            Ok(files) => files,
            Err(e) => {
                tracing::debug!(error = %e, "frame listing failed; skipping poll");
                return self.report(0, None, false);
            }
        };
        if files.len() < 2 {
            self.tracker.reset();
            return self.report(files.len(), None, false);
        }
        // the newest frame may still be open for writing
        let inspected = files[files.len() - 2].clone();
        let hash = match hash_file(&inspected) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::debug!(path = %inspected.display(), error = %e, "frame read failed; skipping poll");
                return self.report(files.len(), None, false);
            }
        };
        let stable = self.tracker.observe(&hash.to_hex());
        self.report(files.len(), Some(inspected), stable)
    }

    fn report(&self, files: usize, inspected: Option<PathBuf>, stable: bool) -> PollReport {
        PollReport {
            files,
            inspected,
            streak: self.tracker.streak(),
            stable,
        }
    }
}
