//! Runner: turns keep output into pushed branches and merge requests
//!
//! For every change a keep yields, in order:
//! 1. stop if `max_mrs` merge requests were already produced this run
//! 2. commit the change on its own branch (even if it will be filtered out)
//! 3. skip unless the change matches the identifier filters
//! 4. emit the diff of the change's files for review
//! 5. ask the hosting service which MR fields humans have edited
//! 6. derive which fields may be overwritten
//! 7. force-push, unless a human pushed code to the branch
//! 8. create or update the merge request
//!
//! Failures of a single change are reported and skipped; a keep that fails
//! loses only its remaining changes. Only configuration errors end the run.

mod progress;

pub use progress::{NoopProgress, ProgressCallback};

use crate::change::Change;
use crate::error::{Error, Result};
use crate::git::{VersionControl, with_branch_from_branch};
use crate::hosting::{HostingClient, PublishRequest};
use crate::keep::Keep;
use crate::types::{MergeRequest, UpdateFlags};
use regex::Regex;
use tracing::{debug, info, warn};

/// Default base and target branch
pub const DEFAULT_BRANCH: &str = "master";

/// Run parameters, passed explicitly to [`Runner::new`]
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Stop once this many merge requests were created or updated
    pub max_mrs: usize,
    /// Only publish changes with an identifier matching one of these
    /// (empty = publish everything)
    pub filter_identifiers: Vec<Regex>,
    /// Project branches are pushed to (the fork)
    pub source_project_id: String,
    /// Project merge requests are opened against
    pub target_project_id: String,
    /// Branch changes are committed on top of
    pub base_branch: String,
    /// Branch merge requests target
    pub target_branch: String,
    /// Commit and diff only; never push or call the hosting service
    pub dry_run: bool,
}

impl RunnerConfig {
    /// Config publishing at most one MR from `master` to `master`
    pub fn new(source_project_id: impl Into<String>, target_project_id: impl Into<String>) -> Self {
        Self {
            max_mrs: 1,
            filter_identifiers: Vec::new(),
            source_project_id: source_project_id.into(),
            target_project_id: target_project_id.into(),
            base_branch: DEFAULT_BRANCH.to_string(),
            target_branch: DEFAULT_BRANCH.to_string(),
            dry_run: false,
        }
    }

    /// Reject parameters the run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_mrs == 0 {
            return Err(Error::Config("max_mrs must be at least 1".into()));
        }
        if self.source_project_id.trim().is_empty() {
            return Err(Error::Config("source project id is empty".into()));
        }
        if self.target_project_id.trim().is_empty() {
            return Err(Error::Config("target project id is empty".into()));
        }
        if self.base_branch.trim().is_empty() || self.target_branch.trim().is_empty() {
            return Err(Error::Config("branch names must not be empty".into()));
        }
        Ok(())
    }
}

/// A change that made it through publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedChange {
    /// Identifiers of the change
    pub identifiers: Vec<String>,
    /// Branch holding the change
    pub branch: String,
    /// Whether the branch was force-pushed
    pub pushed: bool,
    /// Fields housekeeper was allowed to overwrite
    pub update: UpdateFlags,
    /// Resulting merge request (`None` in a dry run)
    pub merge_request: Option<MergeRequest>,
}

/// A change skipped because of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFailure {
    /// Identifiers of the failed change
    pub identifiers: Vec<String>,
    /// What went wrong
    pub error: String,
}

/// A keep that stopped producing changes because of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepFailure {
    /// Keep name
    pub keep: String,
    /// What went wrong
    pub error: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Changes published (or dry-run reported), in order
    pub published: Vec<PublishedChange>,
    /// Branches committed locally but not published because of the filters
    pub filtered_branches: Vec<String>,
    /// Changes skipped because of errors
    pub failures: Vec<ChangeFailure>,
    /// Keeps that failed
    pub keep_failures: Vec<KeepFailure>,
    /// Whether the run stopped because `max_mrs` was reached
    pub reached_limit: bool,
}

impl RunSummary {
    /// Number of merge requests produced so far
    pub fn produced(&self) -> usize {
        self.published.len()
    }

    /// Whether every change and keep succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.keep_failures.is_empty()
    }
}

/// What happened to a change that didn't fail
enum ChangeOutcome {
    Published(PublishedChange),
    Filtered(String),
}

/// Publishes the changes produced by a list of keeps
pub struct Runner {
    config: RunnerConfig,
    keeps: Vec<Box<dyn Keep>>,
}

impl Runner {
    /// Create a runner; fails with a configuration error on invalid parameters
    pub fn new(config: RunnerConfig, keeps: Vec<Box<dyn Keep>>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, keeps })
    }

    /// Run parameters
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every keep in order until `max_mrs` merge requests were produced.
    ///
    /// Changes are processed strictly one at a time; a keep's stream is
    /// dropped as soon as the limit is reached.
    #[allow(clippy::future_not_send)]
    pub async fn run(
        &mut self,
        vcs: &mut dyn VersionControl,
        hosting: &dyn HostingClient,
        progress: &dyn ProgressCallback,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let config = &self.config;

        'keeps: for keep in &mut self.keeps {
            if summary.produced() >= config.max_mrs {
                summary.reached_limit = true;
                break;
            }

            let keep_name = keep.name().to_string();
            info!(keep = %keep_name, "running keep");
            progress.on_keep_started(&keep_name).await;

            let mut changes = match keep.changes() {
                Ok(changes) => changes,
                Err(e) => {
                    record_keep_failure(&mut summary, progress, &keep_name, e).await;
                    continue;
                }
            };

            loop {
                if summary.produced() >= config.max_mrs {
                    info!(max_mrs = config.max_mrs, "merge request limit reached");
                    summary.reached_limit = true;
                    break 'keeps;
                }

                let change = match changes.next() {
                    Some(Ok(change)) => change,
                    Some(Err(e)) => {
                        record_keep_failure(&mut summary, progress, &keep_name, e).await;
                        break;
                    }
                    None => break,
                };

                match process_change(config, &change, vcs, hosting, progress).await {
                    Ok(ChangeOutcome::Published(published)) => {
                        progress.on_published(&change, &published).await;
                        summary.published.push(published);
                    }
                    Ok(ChangeOutcome::Filtered(branch)) => {
                        summary.filtered_branches.push(branch);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(
                            identifiers = ?change.identifiers,
                            error = %e,
                            "skipping change"
                        );
                        progress.on_change_failed(&change, &e).await;
                        summary.failures.push(ChangeFailure {
                            identifiers: change.identifiers.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            produced = summary.produced(),
            filtered = summary.filtered_branches.len(),
            failed = summary.failures.len(),
            "run complete"
        );
        Ok(summary)
    }
}

async fn record_keep_failure(
    summary: &mut RunSummary,
    progress: &dyn ProgressCallback,
    keep: &str,
    error: Error,
) {
    warn!(keep, error = %error, "keep failed");
    progress.on_keep_failed(keep, &error).await;
    summary.keep_failures.push(KeepFailure {
        keep: keep.to_string(),
        error: error.to_string(),
    });
}

/// Commit, filter, diff, reconcile, push and publish a single change.
///
/// The branch scope is held until publication finishes, and dropping it on
/// any exit path returns the working tree to where it was.
#[allow(clippy::future_not_send)]
async fn process_change(
    config: &RunnerConfig,
    change: &Change,
    vcs: &mut dyn VersionControl,
    hosting: &dyn HostingClient,
    progress: &dyn ProgressCallback,
) -> Result<ChangeOutcome> {
    change.validate()?;

    let mut scope = with_branch_from_branch(vcs, &config.base_branch)?;
    let branch = scope.commit_in_branch(change)?;

    if !change.matches_filters(&config.filter_identifiers) {
        debug!(%branch, "change does not match filters, not publishing");
        return Ok(ChangeOutcome::Filtered(branch));
    }
    progress.on_change(change, &branch).await;

    let diff = scope.diff(&config.base_branch, &branch, &change.changed_files)?;
    progress.on_diff(&branch, &diff).await;

    if config.dry_run {
        debug!(%branch, "dry run, not pushing or publishing");
        return Ok(ChangeOutcome::Published(PublishedChange {
            identifiers: change.identifiers.clone(),
            branch,
            pushed: false,
            update: UpdateFlags::ALL,
            merge_request: None,
        }));
    }

    let edits = hosting
        .non_housekeeper_changes(
            &config.source_project_id,
            &branch,
            &config.target_branch,
            &config.target_project_id,
        )
        .await?;
    let update = UpdateFlags::from_manual_edits(&edits);

    let pushed = edits.allows_push();
    if pushed {
        scope.push(&branch)?;
    } else {
        info!(%branch, "code was changed by someone else, not pushing");
    }

    let merge_request = hosting
        .create_or_update_merge_request(&PublishRequest {
            change,
            source_project_id: &config.source_project_id,
            source_branch: &branch,
            target_branch: &config.target_branch,
            target_project_id: &config.target_project_id,
            update,
        })
        .await?;
    info!(%branch, url = %merge_request.web_url, "merge request ready");

    Ok(ChangeOutcome::Published(PublishedChange {
        identifiers: change.identifiers.clone(),
        branch,
        pushed,
        update,
        merge_request: Some(merge_request),
    }))
}
