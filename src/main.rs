mod batch;
mod config;
mod feed;
mod http;
mod report;

use anyhow::{Context as _, Result, bail};
use config::{FeedConfig, Overrides};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
tidf-pull - download the daily Threat Intelligence Data Feed files

USAGE:
    tidf-pull [FLAGS] [OPTIONS]

FLAGS:
    -h, --help               Print this help and exit
    -V, --version            Print version and exit
        --utc                Compute yesterday's date in UTC instead of local time
        --no-color           Disable colored output (also honors NO_COLOR)

OPTIONS:
    -o, --output-dir <DIR>   Directory the feed files are written to [env: TIDF_OUTPUT_DIR]
        --base-url <URL>     Feed base URL, file names are appended verbatim [env: TIDF_BASE_URL]
        --files <LIST>       Comma separated feed identifiers [env: TIDF_FILES]
        --date <YYYY-MM-DD>  Reference date instead of yesterday [env: TIDF_DATE]
        --timeout <SECS>     Per-request timeout [env: TIDF_TIMEOUT_SECS]
        --config <FILE>      JSON config file [env: TIDF_CONFIG]

ENVIRONMENT:
    WXAAPIKEY                API key (required)
    TIDF_DATE_BASIS          'local' (default) or 'utc'
    RUST_LOG                 Log filter for diagnostics on stderr (default: info)
";

/// What the command line asks for
#[derive(Debug, PartialEq, Eq)]
enum CliAction {
    Help,
    Version,
    Run { overrides: Overrides, no_color: bool },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn handle_args(args: impl IntoIterator<Item = String>) -> Result<CliAction> {
    let mut overrides = Overrides::default();
    let mut no_color = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_owned(), Some(value.to_owned())),
            _ => (arg, None),
        };
        if inline.is_some() && matches!(flag.as_str(), "--help" | "--version" | "--utc" | "--no-color") {
            bail!("{flag} does not take a value");
        }
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .with_context(|| format!("Missing value for {flag}"))
        };

        match flag.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--utc" => overrides.date_basis = Some(config::DateBasis::Utc),
            "--no-color" => no_color = true,
            "-o" | "--output-dir" => overrides.output_dir = Some(PathBuf::from(value()?)),
            "--base-url" => overrides.base_url = Some(value()?),
            "--files" => overrides.files = Some(config::parse_file_list(&value()?)),
            "--date" => overrides.date = Some(config::parse_date(&value()?)?),
            "--timeout" => overrides.timeout_secs = Some(config::parse_timeout_secs(&value()?)?),
            "--config" => overrides.config_path = Some(PathBuf::from(value()?)),
            other => bail!("Unknown argument: {other}"),
        }
    }

    Ok(CliAction::Run {
        overrides,
        no_color,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let (overrides, no_color) = match handle_args(std::env::args().skip(1)) {
        Ok(CliAction::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Version) => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Run {
            overrides,
            no_color,
        }) => (overrides, no_color),
        Err(e) => {
            eprintln!("error: {e:#}\n\n{USAGE}");
            return ExitCode::from(1);
        }
    };

    init_logging();

    let config = match FeedConfig::from_env(&overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };
    info!(
        "Downloading {} feed files for {} into {}",
        config.files.len(),
        config.date_stamp(),
        config.output_dir.display()
    );

    let client = match http::FeedClient::new(&config.api_key, config.timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    let color = !no_color && std::env::var_os("NO_COLOR").is_none();
    let mut reporter = report::ConsoleReporter::stdout(color);
    batch::run_batch(&client, &config, &mut reporter).await;

    ExitCode::SUCCESS
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
