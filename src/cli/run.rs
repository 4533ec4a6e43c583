//! Run command - publish the changes produced by the configured keeps

use crate::cli::CliProgress;
use crate::cli::context::{RunContext, RunOptions};
use crate::cli::style::{CHECK, Stylize, arrow};
use anstream::println;
use housekeeper::error::Result;
use housekeeper::runner::{RunSummary, Runner};
use std::path::Path;

/// Run the keeps and publish their changes
pub async fn run_housekeeper(path: &Path, options: &RunOptions, show_diff: bool) -> Result<()> {
    let RunContext {
        mut git,
        hosting,
        config,
        keeps,
    } = RunContext::new(path, options)?;

    if keeps.is_empty() {
        println!("{}", "No keeps configured".muted());
        return Ok(());
    }

    let progress = if show_diff {
        CliProgress::verbose()
    } else {
        CliProgress::compact()
    };

    let mut runner = Runner::new(config, keeps)?;
    let summary = runner.run(&mut git, &hosting, &progress).await?;

    print_summary(&summary, options.dry_run);
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!();
    let verb = if dry_run { "previewed" } else { "published" };
    println!(
        "{} {} {verb}, {} filtered, {} failed",
        format!("{CHECK} Run complete:").success(),
        summary.produced().accent(),
        summary.filtered_branches.len().accent(),
        (summary.failures.len() + summary.keep_failures.len()).accent()
    );

    if summary.reached_limit {
        println!("{}", "Stopped at --max-mrs; remaining changes were not generated".muted());
    }

    for failure in &summary.failures {
        println!(
            "  {} {}: {}",
            arrow(),
            failure.identifiers.join(" ").warn(),
            failure.error
        );
    }
    for failure in &summary.keep_failures {
        println!("  {} keep {}: {}", arrow(), failure.keep.warn(), failure.error);
    }
}
