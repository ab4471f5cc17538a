//! Recording stand-in for the transcoder.

use std::sync::Mutex;

use panorig_core::PanoResult;

use crate::ffmpeg::{ToolOutput, ToolRunner};

type Effect = Box<dyn Fn(&[String]) + Send + Sync>;

/// Records every argument list; fails runs that select a given video codec.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failing_codecs: Vec<String>,
    effect: Option<Effect>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs with `-c:v <codec>` exit with status 1.
    pub fn failing_codec(mut self, codec: &str) -> Self {
        self.failing_codecs.push(codec.to_string());
        self
    }

    /// Called with the arguments of every successful run, e.g. to create
    /// the files the real tool would have written.
    pub fn on_success(mut self, effect: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// Value following `flag` in an argument list.
pub fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

impl ToolRunner for RecordingRunner {
    fn run(&self, args: &[String]) -> PanoResult<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(args.to_vec());
        }
        let codec = arg_value(args, "-c:v").unwrap_or_default();
        if self.failing_codecs.iter().any(|c| c == codec) {
            return Ok(ToolOutput::failed(
                1,
                format!("Cannot load {}: no capable device found", codec),
            ));
        }
        if let Some(effect) = &self.effect {
            effect(args);
        }
        Ok(ToolOutput::ok())
    }
}
