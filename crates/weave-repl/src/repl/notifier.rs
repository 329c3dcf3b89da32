//! Output routing for the REPL
//!
//! Command output, build timings and per-class validation outcomes all go
//! through a [`ReplNotifier`]. Validation failures are sent to the error
//! channel, one line per failing class, so scripted runs can separate them
//! from the classes that built.

use parking_lot::Mutex;

use super::ValidationReport;

pub trait ReplNotifier: Send + Sync {
    fn on_output(&self, content: &str);

    fn on_error(&self, content: &str);

    /// Output of a command that builds definitions, with its duration
    fn on_result(&self, output: &str, duration_ms: u64, quiet: bool);

    /// Reports every class of a validation run, failures on `on_error`
    fn on_validation(&self, report: &ValidationReport) {
        for entry in &report.entries {
            if entry.is_failure() {
                self.on_error(&entry.line());
            } else {
                self.on_output(&entry.line());
            }
        }
        self.on_output(&report.summary());
    }
}

/// Writes to stdout and stderr
#[derive(Debug, Default)]
pub struct DefaultNotifier;

impl ReplNotifier for DefaultNotifier {
    fn on_output(&self, content: &str) {
        if !content.is_empty() {
            println!("{}", content.trim_end());
        }
    }

    fn on_error(&self, content: &str) {
        eprintln!("{}", content);
    }

    fn on_result(&self, output: &str, duration_ms: u64, quiet: bool) {
        println!("{}", output.trim_end());
        if !quiet {
            println!("(built in {}ms)", duration_ms);
        }
    }
}

/// Keeps everything in memory; used when embedding the REPL
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    output: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl BufferedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> Vec<String> {
        self.output.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl ReplNotifier for BufferedNotifier {
    fn on_output(&self, content: &str) {
        self.output.lock().push(content.to_string());
    }

    fn on_error(&self, content: &str) {
        self.errors.lock().push(content.to_string());
    }

    fn on_result(&self, output: &str, _duration_ms: u64, _quiet: bool) {
        self.on_output(output);
    }
}
