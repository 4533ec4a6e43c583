//! housekeeper CLI

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::context::RunOptions;
use cli::style::Stylize;
use housekeeper::git::DEFAULT_REMOTE;
use housekeeper::runner::DEFAULT_BRANCH;
use std::path::PathBuf;
use std::process::ExitCode;
use url::Url;

/// Publish automated code changes as GitLab merge requests
#[derive(Parser)]
#[command(
    name = "housekeeper",
    version,
    about = "Publish automated code changes as GitLab merge requests"
)]
struct Cli {
    /// Path to the repository (defaults to current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Maximum number of merge requests to create or update
    #[arg(short, long, default_value_t = 1)]
    max_mrs: usize,

    /// Only run these keeps (comma-separated; default: all configured keeps)
    #[arg(short, long, value_delimiter = ',')]
    keeps: Vec<String>,

    /// Only publish changes with an identifier matching one of these regexes
    #[arg(long, value_delimiter = ',')]
    filter_identifiers: Vec<String>,

    /// Commit and show diffs without pushing or touching merge requests
    #[arg(short, long)]
    dry_run: bool,

    /// Branch changes are based on
    #[arg(long, default_value = DEFAULT_BRANCH)]
    base_branch: String,

    /// Branch merge requests target
    #[arg(long, default_value = DEFAULT_BRANCH)]
    target_branch: String,

    /// Remote branches are force-pushed to
    #[arg(long, default_value = DEFAULT_REMOTE)]
    remote: String,

    /// Keep definitions file (default: .housekeeper.toml in the repository)
    #[arg(long)]
    config: Option<PathBuf>,

    /// GitLab instance URL
    #[arg(long, env = "HOUSEKEEPER_GITLAB_URL", default_value = "https://gitlab.com")]
    gitlab_url: Url,

    /// Don't print the diff of each change
    #[arg(long)]
    no_diff: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    housekeeper::logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            anstream::eprintln!("{} {e:#}", "error:".error());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let path = path
        .canonicalize()
        .with_context(|| format!("invalid repository path {}", path.display()))?;

    let options = RunOptions {
        max_mrs: cli.max_mrs,
        keeps: cli.keeps,
        filter_identifiers: cli.filter_identifiers,
        dry_run: cli.dry_run,
        base_branch: cli.base_branch,
        target_branch: cli.target_branch,
        remote: cli.remote,
        config: cli.config,
        gitlab_url: cli.gitlab_url,
    };

    cli::run::run_housekeeper(&path, &options, !cli.no_diff).await?;
    Ok(())
}
