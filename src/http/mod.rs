//! HTTP client for the Threat Intelligence Data Feeds.
//!
//! [`FeedClient`] performs exactly one authenticated GET per
//! [`DownloadTarget`] and streams a successful response body straight into
//! the target's local file. There is no retry and no resume: every failure is
//! returned as a [`FetchError`] naming the stage that failed, and the caller
//! decides what to do with it.
//!
//! ## Resource scope
//!
//! The response body and the file handle live only for the duration of
//! [`FeedClient::download`] and are released when it returns, on both the
//! success and the error paths.
//!
//! ## Partial files
//!
//! The local file is only created after a success status is seen, so a
//! non-2xx response never touches the disk. If the body stream or a write
//! fails midway, whatever was written so far is left in place.

use anyhow::{Context as _, Result};
use core::time::Duration;
use futures::StreamExt as _;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt as _;
use tracing::debug;

use crate::feed::{DownloadTarget, authorization_value};

/// Stage of a single download at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Transport,
    Status,
    CreateFile,
    Copy,
}

/// Why a single feed file could not be saved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built (bad URL or unusable credential).
    #[error("invalid request for {url}: {reason}")]
    Request { url: String, reason: String },
    /// DNS, connect, TLS or timeout failure before a response arrived.
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("{0}")]
    Status(StatusCode),
    /// The local file could not be created.
    #[error("failed to create {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Reading the body or writing it to disk failed after the file was created.
    #[error("failed to write {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Request { .. } => Stage::Request,
            Self::Transport(_) => Stage::Transport,
            Self::Status(_) => Stage::Status,
            Self::CreateFile { .. } => Stage::CreateFile,
            Self::Copy { .. } => Stage::Copy,
        }
    }
}

/// Authenticated client for the feed server
pub struct FeedClient {
    /// The underlying `reqwest::Client`, shared by every download of a run.
    client: Client,
    /// Literal `Authorization` header value derived from the API key.
    authorization: String,
    /// Per-request timeout; `None` keeps the client default.
    timeout: Option<Duration>,
}

impl FeedClient {
    /// Creates a client authenticating with `api_key`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized (for example
    /// when no TLS backend is available).
    pub fn new(api_key: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            authorization: authorization_value(api_key),
            timeout,
        })
    }

    /// Builds the `Authorization` header, marked sensitive so it never shows
    /// up in debug output.
    fn auth_header(&self, url: &str) -> Result<HeaderValue, FetchError> {
        let mut value =
            HeaderValue::from_str(&self.authorization).map_err(|e| FetchError::Request {
                url: url.to_owned(),
                reason: format!("credential is not a valid header value: {e}"),
            })?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Downloads one feed file to its local path.
    ///
    /// # Returns
    /// Number of bytes written.
    ///
    /// # Errors
    /// Returns a [`FetchError`] for the first stage that fails. Nothing is
    /// retried.
    pub async fn download(&self, target: &DownloadTarget) -> Result<u64, FetchError> {
        let url = Url::parse(&target.url).map_err(|e| FetchError::Request {
            url: target.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Request {
                url: target.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        let auth = self.auth_header(&target.url)?;

        let mut request = self.client.get(url).header(AUTHORIZATION, auth);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        debug!("Feed server response status: {} for {}", status, target.file_name);

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut file = File::create(&target.local_path)
            .await
            .map_err(|source| FetchError::CreateFile {
                path: target.local_path.clone(),
                source,
            })?;

        Self::copy_body(response, &mut file)
            .await
            .map_err(|source| FetchError::Copy {
                path: target.local_path.clone(),
                source,
            })
    }

    /// Streams the response body into `file` chunk by chunk.
    async fn copy_body(response: reqwest::Response, file: &mut File) -> io::Result<u64> {
        let mut stream = response.bytes_stream();
        let mut written = 0_u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(io::Error::other)?;
            file.write_all(&chunk).await?;
            written = written.saturating_add(chunk.len() as u64);
        }

        file.flush().await?;
        debug!("Wrote {} bytes", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests;
