use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reddit_client::RedditClient;
use timelapse_common::Config;
use timelapse_harvester::projection::{FileMappingSource, StaticMappingSource};
use timelapse_harvester::{
    FeedSource, FsBlobStore, Harvester, JobResponse, MappingSource, RetryPolicy, RetryingFeed,
    SnapshotStore,
};

#[derive(Parser)]
#[command(name = "timelapse-harvester", about = "Subreddit time-lapse harvester")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Snapshot the subreddit's recent submissions into the original-load bucket
    Collect {
        /// Hours between scheduled runs (overrides HOUR_INTERVAL)
        #[arg(long)]
        hour_interval: Option<u32>,
        /// Subreddit to harvest (overrides SUBREDDIT)
        #[arg(long)]
        subreddit: Option<String>,
        #[arg(long)]
        verbose: bool,
        /// Fail on any attribute that cannot be resolved
        #[arg(long)]
        debug: bool,
    },
    /// Re-sample posts that just turned a whole number of days old
    Resample {
        /// Days of collection snapshots to consider (overrides N_DAYS_TIME_LAPSED_SUBMISSIONS)
        #[arg(long)]
        days_back: Option<u32>,
        #[arg(long)]
        verbose: bool,
        #[arg(long)]
        debug: bool,
    },
}

impl Command {
    /// Environment keys set by command-line flags.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        let mut flag = |key: &'static str, set: bool| {
            if set {
                overrides.insert(key, "true".to_string());
            }
        };
        match self {
            Command::Collect {
                verbose, debug, ..
            }
            | Command::Resample {
                verbose, debug, ..
            } => {
                flag("VERBOSE", *verbose);
                flag("DEBUG", *debug);
            }
        }
        match self {
            Command::Collect {
                hour_interval,
                subreddit,
                ..
            } => {
                if let Some(hours) = hour_interval {
                    overrides.insert("HOUR_INTERVAL", hours.to_string());
                }
                if let Some(subreddit) = subreddit {
                    overrides.insert("SUBREDDIT", subreddit.clone());
                }
            }
            Command::Resample { days_back, .. } => {
                if let Some(days) = days_back {
                    overrides.insert("N_DAYS_TIME_LAPSED_SUBMISSIONS", days.to_string());
                }
            }
        }
        overrides
    }
}

/// Configuration with command-line flags taking precedence over `lookup`.
fn load_config(
    command: &Command,
    lookup: impl Fn(&str) -> Option<String>,
) -> timelapse_common::Result<Config> {
    let overrides = command.overrides();
    Config::from_lookup(|key| overrides.get(key).cloned().or_else(|| lookup(key)))
}

fn build_feed(config: &Config) -> Result<Arc<dyn FeedSource>> {
    let client = match (&config.reddit_base_url, &config.reddit_access_token) {
        (Some(base_url), token) => {
            RedditClient::with_base_url(base_url, &config.reddit_user_agent, token.clone())?
        }
        (None, Some(token)) => RedditClient::with_token(&config.reddit_user_agent, token.clone())?,
        (None, None) => RedditClient::new(&config.reddit_user_agent)?,
    };
    Ok(Arc::new(RetryingFeed::new(client, RetryPolicy::default())))
}

fn build_mappings(config: &Config) -> Result<Arc<dyn MappingSource>> {
    let source: Arc<dyn MappingSource> = match &config.mappings_dir {
        Some(dir) => Arc::new(FileMappingSource::new(dir)),
        None => Arc::new(StaticMappingSource::defaults()?),
    };
    Ok(source)
}

async fn run(command: &Command, config: &Config) -> Result<JobResponse> {
    let harvester = Harvester::new(
        build_feed(config)?,
        SnapshotStore::new(Arc::new(FsBlobStore::new(&config.storage_root))),
        build_mappings(config)?,
    );
    let now = Utc::now();

    let response = match command {
        Command::Collect { .. } => harvester.collect_recent_job(config, now).await?,
        Command::Resample { .. } => harvester.resample_aged_job(config, now).await?,
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.command, |key| env::var(key).ok())?;

    let level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("timelapse={level}").parse()?)
                .add_directive(format!("reddit_client={level}").parse()?),
        )
        .init();

    info!("Timelapse harvester starting...");
    config.log_redacted();

    match run(&cli.command, &config).await {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "Job failed");
            println!(
                "{}",
                serde_json::to_string(&JobResponse::failed(format!("{err:#}")))?
            );
            Err(err)
        }
    }
}
