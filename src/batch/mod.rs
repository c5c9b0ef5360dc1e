//! The download loop.
//!
//! Identifiers are processed strictly one after another in list order, each
//! attempted exactly once. Any failure is reported and the loop moves on to
//! the next identifier; nothing escapes a single iteration.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::feed::DownloadTarget;
use crate::http::{FeedClient, FetchError};
use crate::report::Reporter;

/// Result of one download attempt
#[derive(Debug)]
pub enum Outcome {
    Saved { bytes: u64 },
    Failed(FetchError),
}

impl From<Result<u64, FetchError>> for Outcome {
    fn from(result: Result<u64, FetchError>) -> Self {
        match result {
            Ok(bytes) => Self::Saved { bytes },
            Err(error) => Self::Failed(error),
        }
    }
}

/// Counts for the closing log line. Never affects the exit status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Creates the output directory if needed. Failure is only logged: every
/// download will then fail on its own at the file-create stage.
async fn prepare_output_dir(dir: &Path) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(
            "Failed to create output directory {}: {}",
            dir.display(),
            e
        );
    }
}

/// Runs one full batch and reports every outcome.
pub async fn run_batch<R: Reporter>(
    client: &FeedClient,
    config: &FeedConfig,
    reporter: &mut R,
) -> BatchSummary {
    let date = config.date_stamp();
    let mut summary = BatchSummary::default();

    reporter.started(config.files.len(), &date);
    prepare_output_dir(&config.output_dir).await;

    for (index, identifier) in config.files.iter().enumerate() {
        let attempt = index + 1;
        let target = DownloadTarget::new(&config.base_url, &config.output_dir, &date, identifier);
        debug!(attempt, identifier = %target.identifier, url = %target.url, "Fetching feed file");

        let outcome = Outcome::from(client.download(&target).await);
        summary.attempted += 1;
        match &outcome {
            Outcome::Saved { bytes } => {
                summary.saved += 1;
                info!(attempt, identifier = %target.identifier, bytes, "Saved {}", target.local_path.display());
            }
            Outcome::Failed(error) => {
                summary.failed += 1;
                warn!(attempt, identifier = %target.identifier, stage = ?error.stage(), "Download failed: {}", error);
            }
        }

        reporter.outcome(attempt, &target, &outcome);
    }

    reporter.finished();
    info!(
        attempted = summary.attempted,
        saved = summary.saved,
        failed = summary.failed,
        "Batch complete"
    );
    summary
}
