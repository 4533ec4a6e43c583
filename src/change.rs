//! A single proposed code change produced by a keep

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Longest branch name used verbatim
const MAX_BRANCH_NAME_LEN: usize = 240;

/// Prefix kept when a branch name is too long (a digest is appended)
const TRUNCATED_BRANCH_PREFIX_LEN: usize = 200;

/// Hex digits of the digest appended to truncated branch names
const BRANCH_DIGEST_LEN: usize = 15;

/// Changelog trailer used when a keep doesn't pick one
const DEFAULT_CHANGELOG_TYPE: &str = "other";

const MR_FOOTER: &str = "\
This change was generated by housekeeper.

You may edit the title, description, labels, reviewers or code of this merge \
request. Housekeeper notices such edits and stops overwriting the fields you \
changed; pushing commits to the branch stops it from force-pushing the code.";

/// A proposed, self-contained code change
///
/// Changes are created fresh on every run. `identifiers` are the only
/// identity a change has across runs: equal identifiers always map to the
/// same branch, and therefore to the same merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Ordered identifiers, used to derive the branch name
    pub identifiers: Vec<String>,
    /// Commit subject and MR title
    pub title: String,
    /// MR body (the footer is appended by [`Change::mr_description`])
    pub description: String,
    /// Repository-relative paths touched by this change
    pub changed_files: Vec<String>,
    /// Labels applied to the MR
    #[serde(default)]
    pub labels: Vec<String>,
    /// Usernames requested as reviewers
    #[serde(default)]
    pub reviewers: Vec<String>,
    /// Changelog trailer value (defaults to "other")
    #[serde(default)]
    pub changelog_type: Option<String>,
}

impl Change {
    /// Check the change carries everything needed to commit and publish it
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.identifiers.iter().all(|i| i.trim().is_empty()) {
            missing.push("identifiers");
        }
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.changed_files.is_empty() {
            missing.push("changed_files");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidChange(format!(
                "{} missing {}",
                self.identifiers.join(" "),
                missing.join(", ")
            )))
        }
    }

    /// Deterministic branch name derived from the identifiers.
    ///
    /// Runs of characters outside `[A-Za-z0-9_]` become a single `-`, the
    /// identifiers are joined with `-` and the result is lower-cased. Names
    /// over 240 bytes are cut to 200 and suffixed with a SHA-256 prefix of
    /// the full name so distinct long names stay distinct.
    pub fn branch_name(&self) -> String {
        let joined = self
            .identifiers
            .iter()
            .map(|identifier| hyphenate(identifier))
            .collect::<Vec<_>>()
            .join("-");
        let name = joined
            .strip_prefix('-')
            .unwrap_or(&joined)
            .to_ascii_lowercase();

        if name.len() <= MAX_BRANCH_NAME_LEN {
            return name;
        }

        let digest = format!("{:x}", Sha256::digest(name.as_bytes()));
        format!(
            "{}{}",
            &name[..TRUNCATED_BRANCH_PREFIX_LEN],
            &digest[..BRANCH_DIGEST_LEN]
        )
    }

    /// Whether the change is selected for publication.
    ///
    /// An empty filter list selects every change; otherwise at least one
    /// identifier must match at least one pattern.
    pub fn matches_filters(&self, filters: &[Regex]) -> bool {
        filters.is_empty()
            || self
                .identifiers
                .iter()
                .any(|identifier| filters.iter().any(|filter| filter.is_match(identifier)))
    }

    /// MR body: the keep's description followed by the housekeeper footer
    pub fn mr_description(&self) -> String {
        format!("{}\n\n{MR_FOOTER}\n", self.description.trim_end())
    }

    /// Commit message: title, MR body and a changelog trailer
    pub fn commit_message(&self) -> String {
        let changelog = self
            .changelog_type
            .as_deref()
            .unwrap_or(DEFAULT_CHANGELOG_TYPE);
        format!(
            "{}\n\n{}\nChangelog: {changelog}\n",
            self.title.trim(),
            self.mr_description()
        )
    }
}

/// Replace runs of non-word characters with a single hyphen
fn hyphenate(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut in_run = false;
    for c in identifier.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}
