//! Keeps: pluggable generators of proposed changes
//!
//! A keep scans the repository for one maintenance concern, edits the
//! working tree, and yields a [`Change`] describing each edit. The runner
//! consumes the stream strictly in order and may drop it early, so a keep
//! must not rely on being run to completion.

mod command;

pub use command::{CommandKeep, KeepDefinition};

use crate::change::Change;
use crate::error::Result;

/// Lazy, finite, non-restartable sequence of changes.
///
/// An `Err` item ends the keep's output: the runner reports it and moves on
/// to the next keep.
pub type ChangeStream<'a> = Box<dyn Iterator<Item = Result<Change>> + 'a>;

/// A generator of proposed changes for one maintenance concern
pub trait Keep {
    /// Name used in logs and for `--keeps` selection
    fn name(&self) -> &str;

    /// Start scanning and return the changes found.
    ///
    /// Calling this again re-scans; the new stream may differ in content or
    /// order from the previous one.
    fn changes(&mut self) -> Result<ChangeStream<'_>>;
}
