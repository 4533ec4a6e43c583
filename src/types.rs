//! Core types for housekeeper

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An aspect of a published merge request that a human may edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    /// MR title
    Title,
    /// MR description
    Description,
    /// Commits on the source branch
    Code,
    /// MR labels
    Labels,
    /// Requested reviewers
    Reviewers,
}

impl std::fmt::Display for ChangeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Description => write!(f, "description"),
            Self::Code => write!(f, "code"),
            Self::Labels => write!(f, "labels"),
            Self::Reviewers => write!(f, "reviewers"),
        }
    }
}

/// Fields of a merge request that were changed by someone other than housekeeper
///
/// Recomputed on every run from the hosting service; an empty set means the
/// automation owns every field and may overwrite all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFieldSet(BTreeSet<ChangeField>);

impl ChangeFieldSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Record a manually edited field
    pub fn insert(&mut self, field: ChangeField) -> bool {
        self.0.insert(field)
    }

    /// Whether `field` was edited by a human
    pub fn contains(&self, field: ChangeField) -> bool {
        self.0.contains(&field)
    }

    /// Whether no field was edited by a human
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Edited fields in a stable order
    pub fn iter(&self) -> impl Iterator<Item = ChangeField> + '_ {
        self.0.iter().copied()
    }

    /// Whether the branch may be force-pushed.
    ///
    /// Pushing would discard commits a human added on top of the branch.
    pub fn allows_push(&self) -> bool {
        !self.contains(ChangeField::Code)
    }
}

impl FromIterator<ChangeField> for ChangeFieldSet {
    fn from_iter<I: IntoIterator<Item = ChangeField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for ChangeFieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.iter().map(|field| field.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Which merge request fields housekeeper is allowed to overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct UpdateFlags {
    /// Overwrite the title
    pub title: bool,
    /// Overwrite the description
    pub description: bool,
    /// Reconcile labels (always true)
    pub labels: bool,
    /// Overwrite the requested reviewers
    pub reviewers: bool,
}

impl UpdateFlags {
    /// Flags allowing every field to be written
    pub const ALL: Self = Self {
        title: true,
        description: true,
        labels: true,
        reviewers: true,
    };

    /// Derive flags from the fields humans have edited.
    ///
    /// Labels are never protected: housekeeper only adds its own labels, so
    /// reconciling them cannot remove a human's.
    pub fn from_manual_edits(edits: &ChangeFieldSet) -> Self {
        Self {
            title: !edits.contains(ChangeField::Title),
            description: !edits.contains(ChangeField::Description),
            labels: true,
            reviewers: !edits.contains(ChangeField::Reviewers),
        }
    }
}

/// Handle to a created or updated merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped MR number
    pub iid: u64,
    /// Web URL for the MR
    pub web_url: String,
}
