//! Handle on a launched host process.
//!
//! The host runs uncontrolled; all the orchestrator can do is ask whether it
//! exited and kill it.

use std::process::Child;
use std::time::Duration;

use panorig_core::{Clock, PanoError, PanoResult};

/// Interval between exit checks while waiting for the host to quit.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostExit {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl HostExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for HostExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

pub trait HostProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check.
    fn try_exit(&mut self) -> PanoResult<Option<HostExit>>;

    /// Force the process to stop.
    fn terminate(&mut self) -> PanoResult<()>;
}

/// A spawned OS process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl HostProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn try_exit(&mut self) -> PanoResult<Option<HostExit>> {
        let status = self.child.try_wait()?;
        Ok(status.map(|s| HostExit { code: s.code() }))
    }

    fn terminate(&mut self) -> PanoResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| PanoError::Tool(format!("failed to kill host process: {}", e)))?;
        self.child.wait()?;
        Ok(())
    }
}

/// Poll until the process exits or `timeout` elapses on `clock`.
/// Returns `None` on timeout.
pub fn wait_for_exit(
    process: &mut dyn HostProcess,
    timeout: Duration,
    clock: &dyn Clock,
) -> PanoResult<Option<HostExit>> {
    let deadline = clock.now() + timeout;
    loop {
        if let Some(exit) = process.try_exit()? {
            return Ok(Some(exit));
        }
        let now = clock.now();
        if now >= deadline {
            return Ok(None);
        }
        clock.sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}
