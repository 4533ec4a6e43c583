//! Hosting services for merge request reconciliation
//!
//! The runner only talks to the hosting service through [`HostingClient`],
//! so tests can substitute a recording mock.

mod gitlab;

pub use gitlab::GitLabClient;

use crate::change::Change;
use crate::error::Result;
use crate::types::{ChangeFieldSet, MergeRequest, UpdateFlags};
use async_trait::async_trait;

/// Everything needed to create or update the merge request for one change
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// Change being published
    pub change: &'a Change,
    /// Project the branch was pushed to (the fork)
    pub source_project_id: &'a str,
    /// Branch holding the change
    pub source_branch: &'a str,
    /// Branch the MR targets
    pub target_branch: &'a str,
    /// Project the MR is opened against
    pub target_project_id: &'a str,
    /// Fields housekeeper may overwrite on an existing MR
    pub update: UpdateFlags,
}

/// Hosting service operations used by the runner
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Fields of the MR for `source_branch` that someone other than
    /// housekeeper changed since it last wrote them.
    ///
    /// Returns an empty set when no MR exists yet.
    async fn non_housekeeper_changes(
        &self,
        source_project_id: &str,
        source_branch: &str,
        target_branch: &str,
        target_project_id: &str,
    ) -> Result<ChangeFieldSet>;

    /// Create the MR, or update the fields of an existing one allowed by
    /// `request.update`.
    ///
    /// Code never travels through this call; it reaches the remote only by
    /// pushing the branch.
    async fn create_or_update_merge_request(
        &self,
        request: &PublishRequest<'_>,
    ) -> Result<MergeRequest>;
}
