//! CLI command implementations

pub mod context;
pub mod run;
pub mod style;

use anstream::{eprintln, println};
use async_trait::async_trait;
use housekeeper::Change;
use housekeeper::error::Error;
use housekeeper::runner::{ProgressCallback, PublishedChange};
use style::{Stylize, arrow, check};

/// Prints runner progress for an operator watching the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct CliProgress {
    /// Print the full audit diff of each change
    pub show_diff: bool,
}

impl CliProgress {
    /// Progress output including diffs
    pub const fn verbose() -> Self {
        Self { show_diff: true }
    }

    /// Progress output without diffs
    pub const fn compact() -> Self {
        Self { show_diff: false }
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_keep_started(&self, keep: &str) {
        println!("{} {}", "Running keep".emphasis(), keep.accent());
    }

    async fn on_change(&self, change: &Change, branch: &str) {
        println!();
        println!("  {} {}", arrow(), change.title.emphasis());
        println!("    {}: {}", "branch".muted(), branch.accent());
        if !change.labels.is_empty() {
            println!("    {}: {}", "labels".muted(), change.labels.join(", "));
        }
        if !change.reviewers.is_empty() {
            println!("    {}: {}", "reviewers".muted(), change.reviewers.join(", "));
        }
    }

    async fn on_diff(&self, _branch: &str, diff: &str) {
        if self.show_diff {
            println!("{diff}");
        }
    }

    async fn on_published(&self, _change: &Change, published: &PublishedChange) {
        match &published.merge_request {
            Some(mr) => {
                let pushed = if published.pushed {
                    String::new()
                } else {
                    " (code edited by someone else, not pushed)".warn()
                };
                println!("    {} {}{pushed}", check(), mr.web_url.accent());
            }
            None => println!("    {}", "dry run: not pushed, no merge request".muted()),
        }
    }

    async fn on_change_failed(&self, change: &Change, error: &Error) {
        eprintln!(
            "    {} {}: {error}",
            "skipped".warn(),
            change.identifiers.join(" ")
        );
    }

    async fn on_keep_failed(&self, keep: &str, error: &Error) {
        eprintln!("{} keep {keep}: {error}", "failed".error());
    }
}
