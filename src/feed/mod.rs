//! Naming rules for the daily Threat Intelligence Data Feed files.
//!
//! Every feed file is published as `tidf.<YYYY-MM-DD>.daily.<identifier>.gz`
//! directly under the feed base URL, and is saved locally under the same name.

use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "tidf";
const FILE_KIND: &str = "daily";
const FILE_SUFFIX: &str = ".gz";

/// Remote (and local) name of one feed file for a reference date.
pub fn remote_file_name(date: &str, identifier: &str) -> String {
    format!("{FILE_PREFIX}.{date}.{FILE_KIND}.{identifier}{FILE_SUFFIX}")
}

/// Value of the `Authorization` header expected by the feed provider.
///
/// The provider takes the API key as both user and password, joined by a
/// colon and sent as-is. It is not base64 encoded.
pub fn authorization_value(api_key: &str) -> String {
    format!("Basic {api_key}:{api_key}")
}

/// One file to fetch: where it lives remotely and where it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub identifier: String,
    pub file_name: String,
    pub url: String,
    pub local_path: PathBuf,
}

impl DownloadTarget {
    /// Derives the target for `identifier`.
    ///
    /// The URL is the base URL with the file name appended verbatim; it is
    /// only validated when the request is built.
    pub fn new(base_url: &str, output_dir: &Path, date: &str, identifier: &str) -> Self {
        let file_name = remote_file_name(date, identifier);
        Self {
            identifier: identifier.to_owned(),
            url: format!("{base_url}{file_name}"),
            local_path: output_dir.join(&file_name),
            file_name,
        }
    }
}
