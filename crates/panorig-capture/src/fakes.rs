//! In-memory fakes for the host process and input seams (testing and dry runs).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use panorig_core::{PanoError, PanoResult};

use crate::input::{InputInjector, TriggerKey};
use crate::process::{HostExit, HostProcess};

// ---------------------------------------------------------------------------
// ScriptedProcess
// ---------------------------------------------------------------------------

type PollHook = Box<dyn FnMut(u32) -> Option<HostExit> + Send>;

/// A host process whose behaviour is driven by a closure called on every
/// exit check with the 1-based poll count.
pub struct ScriptedProcess {
    polls: u32,
    hook: PollHook,
    exited: Option<HostExit>,
    terminated: Arc<AtomicBool>,
}

impl ScriptedProcess {
    pub fn new(hook: impl FnMut(u32) -> Option<HostExit> + Send + 'static) -> Self {
        Self {
            polls: 0,
            hook: Box::new(hook),
            exited: None,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exits cleanly on the `n`th exit check.
    pub fn exits_after(n: u32) -> Self {
        Self::new(move |poll| (poll >= n).then_some(HostExit { code: Some(0) }))
    }

    pub fn never_exits() -> Self {
        Self::new(|_| None)
    }

    /// Flag set once `terminate` is called; stays readable after the
    /// process is boxed and handed away.
    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminated)
    }
}

impl HostProcess for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn try_exit(&mut self) -> PanoResult<Option<HostExit>> {
        if self.exited.is_none() {
            self.polls += 1;
            self.exited = (self.hook)(self.polls);
        }
        Ok(self.exited)
    }

    fn terminate(&mut self) -> PanoResult<()> {
        self.terminated.store(true, Ordering::SeqCst);
        if self.exited.is_none() {
            self.exited = Some(HostExit { code: None });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingInjector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(TriggerKey),
    Click,
}

/// Records every input event; can be told to fail on one key.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<InputEvent>>,
    fail_on: Mutex<Option<TriggerKey>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(key: TriggerKey) -> Self {
        let injector = Self::default();
        injector.fail_on(Some(key));
        injector
    }

    pub fn fail_on(&self, key: Option<TriggerKey>) {
        if let Ok(mut slot) = self.fail_on.lock() {
            *slot = key;
        }
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<TriggerKey> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InputEvent::Key(k) => Some(k),
                InputEvent::Click => None,
            })
            .collect()
    }

    fn push(&self, event: InputEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl InputInjector for RecordingInjector {
    fn send_key_trigger(&self, key: TriggerKey) -> PanoResult<()> {
        let fail = self.fail_on.lock().map(|k| *k == Some(key)).unwrap_or(false);
        if fail {
            return Err(PanoError::Tool(format!("simulated input failure on {}", key)));
        }
        self.push(InputEvent::Key(key));
        Ok(())
    }

    fn send_click(&self) -> PanoResult<()> {
        self.push(InputEvent::Click);
        Ok(())
    }
}
