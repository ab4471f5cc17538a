//! Artifact file naming: `<face><NNNN>.<ext>` frames and `<face>.<ext>` audio.

use std::path::{Path, PathBuf};

/// Zero-padding of frame indices in file names.
pub const FRAME_DIGITS: usize = 4;

/// Matches one face's frame sequence: the face name, one or more digits,
/// then the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePattern {
    prefix: String,
    ext: String,
}

impl FramePattern {
    pub fn new(prefix: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ext: ext.into().trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Same face, different file format.
    pub fn with_ext(&self, ext: &str) -> Self {
        Self::new(self.prefix.clone(), ext)
    }

    /// Frame index encoded in `file_name`, if it belongs to this sequence.
    pub fn frame_index(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(&self.prefix)?;
        let (digits, ext) = rest.split_once('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !ext.eq_ignore_ascii_case(&self.ext) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.frame_index(file_name).is_some()
    }

    /// Numbered-sequence pattern understood by ffmpeg's image2 demuxer.
    pub fn ffmpeg_pattern(&self) -> String {
        format!("{}%0{}d.{}", self.prefix, FRAME_DIGITS, self.ext)
    }

    pub fn frame_name(&self, index: u64) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.ext,
            width = FRAME_DIGITS
        )
    }

    /// List matching files in one directory, in frame order.
    /// A missing directory yields an empty list.
    pub fn list(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        self.list_all(std::slice::from_ref(&dir.to_path_buf()))
    }

    /// List matching files across several directories, in frame order.
    pub fn list_all(&self, dirs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for dir in dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name();
                if let Some(name) = name.to_str() {
                    if self.matches(name) && entry.file_type()?.is_file() {
                        found.push(entry.path());
                    }
                }
            }
        }
        sort_frames(&mut found);
        Ok(found)
    }
}

/// Sort frame paths by file name, shorter digit runs first, so frame 10000
/// comes after frame 9999.
pub fn sort_frames(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        let an = a.file_name().map(|n| n.to_string_lossy().into_owned());
        let bn = b.file_name().map(|n| n.to_string_lossy().into_owned());
        let key = |n: &Option<String>| {
            let n = n.clone().unwrap_or_default();
            (n.len(), n)
        };
        key(&an).cmp(&key(&bn))
    });
}

/// Audio file name for a face.
pub fn audio_file_name(face: &str, ext: &str) -> String {
    format!("{}.{}", face, ext.trim_start_matches('.'))
}
