//! Temporary replacement of a host configuration file.
//!
//! The autoexec variant has to inject its control script through a file the
//! host reads on every start. The user's copy is backed up next to it and
//! put back on release, or on drop if the session unwinds early.

use std::path::{Path, PathBuf};

use panorig_core::{PanoError, PanoResult};

#[derive(Debug)]
pub struct HostConfigGuard {
    target: PathBuf,
    backup: PathBuf,
    had_original: bool,
    released: bool,
}

impl HostConfigGuard {
    /// Back up `target` and replace it with `contents`.
    ///
    /// A backup left behind by a crashed session is the user's real file;
    /// it is kept rather than overwritten with our injected copy.
    pub fn acquire(target: &Path, contents: &str) -> PanoResult<Self> {
        let backup = backup_path(target);
        let had_original = if backup.exists() {
            tracing::warn!(
                backup = %backup.display(),
                "found backup from an interrupted session; keeping it as the original"
            );
            true
        } else if target.exists() {
            std::fs::copy(target, &backup)?;
            true
        } else {
            false
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, contents).map_err(|source| PanoError::ScriptWrite {
            path: target.to_path_buf(),
            source,
        })?;
        tracing::debug!(target = %target.display(), "host config replaced");

        Ok(Self {
            target: target.to_path_buf(),
            backup,
            had_original,
            released: false,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Put the original back (or remove the injected file if there was none).
    pub fn release(mut self) -> PanoResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> PanoResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.had_original {
            if self.target.exists() {
                std::fs::remove_file(&self.target)?;
            }
            std::fs::rename(&self.backup, &self.target)?;
        } else if self.target.exists() {
            std::fs::remove_file(&self.target)?;
        }
        tracing::debug!(target = %self.target.display(), "host config restored");
        Ok(())
    }
}

impl Drop for HostConfigGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(
                target = %self.target.display(),
                error = %e,
                "failed to restore host config"
            );
        }
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("autoexec.cfg");
        std::fs::write(&target, "user settings").unwrap();

        let guard = HostConfigGuard::acquire(&target, "exec render_front.cfg").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "exec render_front.cfg");
        assert!(dir.path().join("autoexec.cfg.bak").exists());

        guard.release().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "user settings");
        assert!(!dir.path().join("autoexec.cfg.bak").exists());
    }

    #[test]
    fn test_drop_removes_injected_file_when_none_existed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cfg").join("autoexec.cfg");
        {
            let _guard = HostConfigGuard::acquire(&target, "exec render_up.cfg").unwrap();
            assert!(target.exists());
        }
        assert!(!target.exists());
    }

    #[test]
    fn test_panic_unwinding_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("autoexec.cfg");
        std::fs::write(&target, "user settings").unwrap();

        let path = target.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = HostConfigGuard::acquire(&path, "exec render_back.cfg").unwrap();
            panic!("capture blew up");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "user settings");
        assert!(!dir.path().join("autoexec.cfg.bak").exists());
    }

    #[test]
    fn test_stale_backup_is_kept_as_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("autoexec.cfg");
        std::fs::write(&target, "injected by a crashed run").unwrap();
        std::fs::write(dir.path().join("autoexec.cfg.bak"), "user settings").unwrap();

        let guard = HostConfigGuard::acquire(&target, "exec render_left.cfg").unwrap();
        guard.release().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "user settings");
    }
}
