//! Terminal sinks
//!
//! Console output goes to stdout untouched. Progress milestones and warnings
//! go to stderr, colored.

use colored::*;
use jack_pipeline::{OutputSink, Progress, ProgressSink};

/// Writes pipeline output and progress to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn append_line(&self, line: &str) {
        println!("{}", line);
    }
}

impl ProgressSink for TerminalSink {
    fn report(&self, progress: Progress) {
        eprintln!("{} {}", "→".cyan(), progress.to_string().bold());
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", "!".yellow().bold(), message.yellow());
    }
}
