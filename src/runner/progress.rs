//! Progress reporting for runner operations

use crate::change::Change;
use crate::error::Error;
use crate::runner::PublishedChange;
use async_trait::async_trait;

/// Receives notifications as the runner works through keeps and changes.
///
/// Every method has an empty default so implementors pick what they show.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A keep is about to be scanned
    async fn on_keep_started(&self, _keep: &str) {}

    /// A selected change was committed to `branch`
    async fn on_change(&self, _change: &Change, _branch: &str) {}

    /// Audit diff of a selected change, restricted to its files
    async fn on_diff(&self, _branch: &str, _diff: &str) {}

    /// A change was published (or would have been, in a dry run)
    async fn on_published(&self, _change: &Change, _published: &PublishedChange) {}

    /// A change was skipped because of an error
    async fn on_change_failed(&self, _change: &Change, _error: &Error) {}

    /// A keep stopped producing changes because of an error
    async fn on_keep_failed(&self, _keep: &str, _error: &Error) {}
}

/// Progress callback that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}
