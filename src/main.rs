use archiver_core::{resolve, CoreError, ErrorReporter, Overrides, Settings, BEARER_TOKEN_ENV};
use clap::Parser;
use poll_service::Poller;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use twitter_client::TwitterApiClient;

const DEFAULT_LOG_FILTER: &str = "timeline_archiver=info,poll_service=info,archive_store=info,\
twitter_client=info,archiver_core=info";

/// Get timeline from Twitter.
#[derive(Parser, Debug)]
#[command(name = "timeline-archiver")]
#[command(version)]
struct Cli {
    /// username
    #[arg(long)]
    username: String,

    /// limit [default: 30]
    #[arg(long)]
    limit: Option<u32>,

    /// time for sleep between each pull [default: 30]
    #[arg(long = "sleepseconds")]
    sleep_seconds: Option<u64>,

    /// output directory [default: current directory]
    #[arg(long)]
    output: Option<PathBuf>,

    /// TOML settings file; flags given here take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the timeline API [default: https://api.twitter.com]
    #[arg(long)]
    api_base: Option<String>,

    /// API bearer token
    #[arg(long, env = BEARER_TOKEN_ENV, hide_env_values = true)]
    bearer_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();

    let result = run(cli).await;
    if let Err(e) = &result {
        reporter.report_error(e);
    }
    result
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let cwd = std::env::current_dir()?;
    let overrides = Overrides {
        limit: cli.limit,
        sleep_seconds: cli.sleep_seconds,
        output: cli.output,
        api_base: cli.api_base,
    };
    let (poll_config, api_config) =
        resolve(&cli.username, cli.bearer_token, &settings, overrides, &cwd)?;

    tracing::info!(
        "argument: username is {}, output is {}, limit is {}, sleepseconds is {}, api is {}",
        poll_config.username,
        poll_config.output_dir.display(),
        poll_config.limit,
        poll_config.sleep_seconds,
        api_config.api_base
    );

    let fetcher = TwitterApiClient::new(api_config)?;
    let mut poller = Poller::new(poll_config, fetcher);

    tokio::select! {
        result = poller.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("interrupted, stopping");
            Ok(())
        }
    }
}
