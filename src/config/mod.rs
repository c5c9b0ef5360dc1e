//! Run configuration for a feed download batch.
//!
//! A [`FeedConfig`] is resolved once at startup from four layers, each one
//! overriding the previous:
//!
//! 1. Built-in defaults ([`DEFAULT_BASE_URL`], [`DEFAULT_FILES`], output to `.`)
//! 2. An optional JSON config file (`--config` or `TIDF_CONFIG`)
//! 3. Environment variables (`TIDF_*`, credential in [`API_KEY_VAR`])
//! 4. Command-line flags ([`Overrides`])
//!
//! The credential is only ever taken from the environment.
//!
//! ## Reference date
//!
//! Feed files are published for the previous day, so unless a date is given
//! explicitly the reference date is "yesterday" in the configured
//! [`DateBasis`]. Host local time is the default.

use anyhow::{Context as _, Result, bail};
use chrono::{Local, NaiveDate, Utc};
use core::str::FromStr;
use core::time::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Base URL of the Threat Intelligence Data Feeds
pub const DEFAULT_BASE_URL: &str =
    "https://threat-intelligence.whoisxmlapi.com/datafeeds/Threat_Intelligence_Data_Feeds/";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "WXAAPIKEY";

/// Feed files published every day
pub const DEFAULT_FILES: &[&str] = &[
    "deny-cidrs.v4",
    "deny-cidrs.v6",
    "deny-domains",
    "deny-ips.v4",
    "deny-ips.v6",
    "hosts",
    "malicious-cidrs.v4.csv",
    "malicious-cidrs.v4.jsonl",
    "malicious-cidrs.v6.csv",
    "malicious-cidrs.v6.jsonl",
    "malicious-domains.csv",
    "malicious-domains.jsonl",
    "malicious-file-hashes.csv",
    "malicious-file-hashes.jsonl",
    "malicious-ips.v4.csv",
    "malicious-ips.v6.csv",
    "malicious-ips.v4.jsonl",
    "malicious-ips.v6.jsonl",
    "malicious-urls.csv",
    "malicious-urls.jsonl",
    "nginx-access.v4",
    "nginx-access.v6",
];

/// Format of the date embedded in feed file names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const ENV_CONFIG: &str = "TIDF_CONFIG";
const ENV_BASE_URL: &str = "TIDF_BASE_URL";
const ENV_OUTPUT_DIR: &str = "TIDF_OUTPUT_DIR";
const ENV_FILES: &str = "TIDF_FILES";
const ENV_DATE_BASIS: &str = "TIDF_DATE_BASIS";
const ENV_DATE: &str = "TIDF_DATE";
const ENV_TIMEOUT_SECS: &str = "TIDF_TIMEOUT_SECS";

/// Clock used to compute "yesterday"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    #[default]
    Local,
    Utc,
}

impl FromStr for DateBasis {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => bail!("Invalid date basis '{other}' (expected 'local' or 'utc')"),
        }
    }
}

/// Optional settings read from a JSON config file.
///
/// Every field may be omitted. Unknown fields are rejected so that a typo
/// does not silently fall back to a default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub files: Option<Vec<String>>,
    pub date_basis: Option<DateBasis>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse JSON config")
    }
}

/// Settings given on the command line
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub files: Option<Vec<String>>,
    pub date: Option<NaiveDate>,
    pub date_basis: Option<DateBasis>,
    pub timeout_secs: Option<u64>,
}

/// Everything one batch run needs. Read-only once built.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub base_url: String,
    pub api_key: String,
    pub output_dir: PathBuf,
    pub files: Vec<String>,
    pub date: NaiveDate,
    pub timeout: Option<Duration>,
}

impl core::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("files", &self.files)
            .field("date", &self.date)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FeedConfig {
    /// Resolves the configuration from the process environment and the
    /// command-line overrides.
    ///
    /// # Errors
    /// Returns an error if the API key is missing, the config file cannot be
    /// loaded, or any value fails to parse.
    pub fn from_env(overrides: &Overrides) -> Result<Self> {
        Self::resolve(
            overrides,
            |key| std::env::var(key).ok(),
            Local::now().date_naive(),
            Utc::now().date_naive(),
        )
    }

    /// Layered resolution with injectable environment and clocks.
    fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
        today_local: NaiveDate,
        today_utc: NaiveDate,
    ) -> Result<Self> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));
        let file = match config_path {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };

        let api_key = env(API_KEY_VAR)
            .filter(|key| !key.is_empty())
            .with_context(|| format!("{API_KEY_VAR} is not set; export your API key"))?;

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| env(ENV_BASE_URL))
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let files = match overrides.files.clone() {
            Some(files) => files,
            None => match env(ENV_FILES) {
                Some(raw) => parse_file_list(&raw),
                None => file
                    .files
                    .unwrap_or_else(|| DEFAULT_FILES.iter().map(|&s| s.to_owned()).collect()),
            },
        };
        if files.is_empty() {
            bail!("The file list is empty; nothing to download");
        }

        let date_basis = match overrides.date_basis {
            Some(basis) => basis,
            None => match env(ENV_DATE_BASIS) {
                Some(raw) => raw.parse()?,
                None => file.date_basis.unwrap_or_default(),
            },
        };

        let date = match overrides.date {
            Some(date) => date,
            None => match env(ENV_DATE) {
                Some(raw) => parse_date(&raw)?,
                None => yesterday(match date_basis {
                    DateBasis::Local => today_local,
                    DateBasis::Utc => today_utc,
                }),
            },
        };

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => Some(secs),
            None => match env(ENV_TIMEOUT_SECS) {
                Some(raw) => Some(parse_timeout_secs(&raw)?),
                None => file.timeout_secs,
            },
        };
        if timeout_secs == Some(0) {
            bail!("Timeout must be at least one second");
        }

        Ok(Self {
            base_url,
            api_key,
            output_dir,
            files,
            date,
            timeout: timeout_secs.map(Duration::from_secs),
        })
    }

    /// Reference date as it appears in feed file names
    pub fn date_stamp(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

/// The day before `today`.
pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
/// Returns an error if the string is not a valid calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid date '{raw}' (expected YYYY-MM-DD)"))
}

/// Parses a timeout in whole seconds.
///
/// # Errors
/// Returns an error if the value is not a non-negative integer.
pub fn parse_timeout_secs(raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid timeout '{raw}' (expected seconds)"))
}

/// Splits a comma separated identifier list, dropping empty entries.
pub fn parse_file_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
