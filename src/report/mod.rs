//! Human-readable progress output for a batch run.
//!
//! The batch loop only talks to the [`Reporter`] trait; [`ConsoleReporter`]
//! is the one implementation used by the binary. It writes one numbered
//! status block per feed file plus a banner and a fixed completion line,
//! optionally colored with ANSI escape codes.
//!
//! Diagnostics go through `tracing` to stderr; this module only ever writes
//! the user-facing report.

use std::io::{self, Write};
use tracing::warn;

use crate::batch::Outcome;
use crate::feed::DownloadTarget;
use crate::http::{FetchError, Stage};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Printed once after every identifier has been attempted
pub const COMPLETION_MESSAGE: &str = "Finished processing all files";

/// Receives progress events from the batch loop.
pub trait Reporter {
    /// Called once before the first download.
    fn started(&mut self, total: usize, date: &str);

    /// Called once per identifier; `attempt` is 1-based.
    fn outcome(&mut self, attempt: usize, target: &DownloadTarget, outcome: &Outcome);

    /// Called once after the last identifier.
    fn finished(&mut self);
}

/// Failure headline for a stage, e.g. "creating the local file for x.gz"
pub fn failure_headline(error: &FetchError, file_name: &str) -> String {
    match error.stage() {
        Stage::Request => format!("creating the request for {file_name} file"),
        Stage::Transport | Stage::Status => format!("downloading the {file_name} file"),
        Stage::CreateFile => format!("creating the local file for {file_name}"),
        Stage::Copy => format!("copying the data to the local file for {file_name}"),
    }
}

/// Writes the report to any `Write` sink.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub const fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    fn line(&mut self, color: &str, text: &str) {
        let result = if self.color && !color.is_empty() {
            writeln!(self.out, "{color}{text}{RESET}")
        } else {
            writeln!(self.out, "{text}")
        };
        if let Err(e) = result {
            warn!("Failed to write report line: {}", e);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn started(&mut self, total: usize, date: &str) {
        self.line("", "Downloading Threat Intel data from whoisxmlapi.com");
        self.line("", "Contact sales@whoisxmlapi.com for more information.");
        self.line("", &format!("Preparing to download {total} files for {date}"));
    }

    fn outcome(&mut self, attempt: usize, target: &DownloadTarget, outcome: &Outcome) {
        match outcome {
            Outcome::Saved { .. } => {
                self.line(
                    YELLOW,
                    &format!(
                        "{attempt} ... Downloading {} file to: {}",
                        target.file_name,
                        target.local_path.display()
                    ),
                );
                self.line(GREEN, "  Success");
            }
            Outcome::Failed(error) => {
                self.line(
                    RED,
                    &format!(
                        "{attempt} ... An error occurred while {}",
                        failure_headline(error, &target.file_name)
                    ),
                );
                self.line(RED, &format!("  Error details: {error}"));
            }
        }
    }

    fn finished(&mut self) {
        self.line("", COMPLETION_MESSAGE);
        if let Err(e) = self.out.flush() {
            warn!("Failed to flush report: {}", e);
        }
    }
}
