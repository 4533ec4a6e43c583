//! Git adapter: branch lifecycle, commit, diff and push
//!
//! The working tree is shared by every change in a run, so all branch
//! switching happens inside a [`BranchScope`]. The scope borrows the
//! version control handle mutably, which makes a second concurrent scope a
//! compile error, and restores the original checkout when dropped.

use crate::change::Change;
use crate::error::{Error, Result};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, instrument, warn};

/// Remote that automated branches are pushed to
pub const DEFAULT_REMOTE: &str = "housekeeper";

/// Version control operations needed by the runner
pub trait VersionControl: Send {
    /// Check out `base`, remembering what to return to.
    ///
    /// Prefer [`with_branch_from_branch`], which guarantees the matching
    /// [`leave_branch_scope`](Self::leave_branch_scope) call.
    fn enter_branch_scope(&mut self, base: &str) -> Result<()>;

    /// Return the working tree to where it was before the scope was entered
    fn leave_branch_scope(&mut self) -> Result<()>;

    /// Commit the change's files on its own branch, created from the scope's base.
    ///
    /// Returns the branch name, which depends only on `change.identifiers`.
    fn commit_in_branch(&mut self, change: &Change) -> Result<String>;

    /// Diff between `base` and `branch`, restricted to `paths`
    fn diff(&self, base: &str, branch: &str, paths: &[String]) -> Result<String>;

    /// Force-push `branch` to the housekeeper remote
    fn push(&self, branch: &str) -> Result<()>;
}

/// Scoped checkout of a base branch.
///
/// Dereferences to the underlying version control so the enclosed logic
/// can commit and push. Dropping the scope (including while unwinding or on
/// an early `?` return) restores the previous checkout; use
/// [`BranchScope::close`] to observe teardown errors instead.
pub struct BranchScope<'a, V: VersionControl + ?Sized> {
    vcs: &'a mut V,
    base: String,
    active: bool,
}

/// Enter a [`BranchScope`] rooted at `base`
pub fn with_branch_from_branch<'a, V: VersionControl + ?Sized>(
    vcs: &'a mut V,
    base: &str,
) -> Result<BranchScope<'a, V>> {
    vcs.enter_branch_scope(base)?;
    Ok(BranchScope {
        vcs,
        base: base.to_string(),
        active: true,
    })
}

impl<V: VersionControl + ?Sized> BranchScope<'_, V> {
    /// Branch the scope is rooted at
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Tear the scope down, reporting any failure to restore the checkout
    pub fn close(mut self) -> Result<()> {
        self.active = false;
        self.vcs.leave_branch_scope()
    }
}

impl<V: VersionControl + ?Sized> Deref for BranchScope<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &*self.vcs
    }
}

impl<V: VersionControl + ?Sized> DerefMut for BranchScope<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut *self.vcs
    }
}

impl<V: VersionControl + ?Sized> Drop for BranchScope<'_, V> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.vcs.leave_branch_scope() {
                warn!(base = %self.base, error = %e, "failed to restore checkout");
            }
        }
    }
}

/// State of an active branch scope
#[derive(Debug, Clone)]
struct ScopeState {
    /// Branch (or detached commit) checked out before the scope
    original: String,
    /// Base the scope is rooted at
    base: String,
}

/// Wrapper for executing git commands in a working directory
#[derive(Debug)]
pub struct Git {
    workdir: PathBuf,
    remote: String,
    scope: Option<ScopeState>,
}

impl Git {
    /// Create a git adapter pushing to [`DEFAULT_REMOTE`]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self::with_remote(workdir, DEFAULT_REMOTE)
    }

    /// Create a git adapter pushing to `remote`
    pub fn with_remote(workdir: impl Into<PathBuf>, remote: &str) -> Self {
        Self {
            workdir: workdir.into(),
            remote: remote.to_string(),
            scope: None,
        }
    }

    /// Working directory git runs in
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Remote branches are pushed to
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Current branch name, or the HEAD commit when detached
    pub fn current_ref(&self) -> Result<String> {
        let branch = self.run_capture(&["branch", "--show-current"])?;
        let branch = branch.trim();
        if !branch.is_empty() {
            return Ok(branch.to_string());
        }
        Ok(self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Fail unless the working tree has no uncommitted or untracked changes
    #[instrument(skip_all)]
    pub fn ensure_clean(&self) -> Result<()> {
        let status = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let dirty: Vec<&str> = status.lines().filter(|l| !l.trim().is_empty()).collect();
        if dirty.is_empty() {
            debug!("worktree is clean");
            return Ok(());
        }
        warn!(dirty_count = dirty.len(), "worktree not clean");
        Err(Error::VersionControl(format!(
            "working tree not clean:\n{}",
            dirty.join("\n")
        )))
    }

    /// Whether a remote with this name is configured
    pub fn has_remote(&self, name: &str) -> Result<bool> {
        let remotes = self.run_capture(&["remote"])?;
        Ok(remotes.lines().any(|r| r.trim() == name))
    }

    /// Commit the branch points at, if the branch exists
    fn branch_commit(&self, branch: &str) -> Result<Option<String>> {
        let output = self.run(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    fn rev_parse(&self, rev: &str) -> Result<String> {
        Ok(self.run_capture(&["rev-parse", rev])?.trim().to_string())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["diff", "--cached", "--name-only"])?;
        Ok(!out.trim().is_empty())
    }

    /// Whether `head` has the same tree and parent as `previous`
    fn same_commit_content(&self, head: &str, previous: &str) -> Result<bool> {
        let head_tree = self.rev_parse(&format!("{head}^{{tree}}"))?;
        let previous_tree = self.rev_parse(&format!("{previous}^{{tree}}"))?;
        if head_tree != previous_tree {
            return Ok(false);
        }
        let parents = |rev: &str| self.run_capture(&["rev-list", "--parents", "-n", "1", rev]);
        let head_parents = parents(head)?;
        let previous_parents = parents(previous)?;
        let strip = |line: &str| line.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
        Ok(strip(head_parents.trim()) == strip(previous_parents.trim()))
    }

    fn commit_on_branch(&self, base: &str, branch: &str, change: &Change) -> Result<()> {
        let previous = self.branch_commit(branch)?;

        debug!(branch, base, "creating branch from base");
        self.run_checked(&["checkout", "--quiet", "-B", branch, base])?;

        let mut add = vec!["add", "--all", "--"];
        add.extend(change.changed_files.iter().map(String::as_str));
        self.run_checked(&add)?;

        if !self.has_staged_changes()? {
            debug!(branch, "no staged changes, skipping commit");
            return Ok(());
        }

        self.run_checked(&["commit", "--quiet", "-m", &change.commit_message()])?;

        if let Some(previous) = previous {
            if self.same_commit_content("HEAD", &previous)? {
                debug!(branch, %previous, "content unchanged, keeping previous commit");
                self.run_checked(&["reset", "--quiet", "--soft", &previous])?;
            }
        }
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::VersionControl(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| Error::VersionControl(format!("spawn git {}: {e}", args.join(" "))))
    }
}

impl VersionControl for Git {
    #[instrument(skip(self))]
    fn enter_branch_scope(&mut self, base: &str) -> Result<()> {
        if let Some(scope) = &self.scope {
            return Err(Error::VersionControl(format!(
                "branch scope from '{}' is already active",
                scope.base
            )));
        }
        let original = self.current_ref()?;
        self.run_checked(&["checkout", "--quiet", base])?;
        debug!(%original, base, "entered branch scope");
        self.scope = Some(ScopeState {
            original,
            base: base.to_string(),
        });
        Ok(())
    }

    #[instrument(skip(self))]
    fn leave_branch_scope(&mut self) -> Result<()> {
        let Some(scope) = self.scope.take() else {
            return Ok(());
        };
        // Discards edits left behind by a change that failed mid-commit.
        self.run_checked(&["checkout", "--quiet", "--force", &scope.original])?;
        debug!(original = %scope.original, "left branch scope");
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn commit_in_branch(&mut self, change: &Change) -> Result<String> {
        let (base, original) = self
            .scope
            .as_ref()
            .map(|s| (s.base.clone(), s.original.clone()))
            .ok_or_else(|| Error::VersionControl("commit outside of a branch scope".into()))?;
        let branch = change.branch_name();
        tracing::Span::current().record("branch", branch.as_str());

        // `checkout -B` would otherwise move the base or the operator's branch.
        if branch == base || branch == original {
            return Err(Error::VersionControl(format!(
                "change branch '{branch}' would overwrite the checked out or base branch"
            )));
        }

        let committed = self.commit_on_branch(&base, &branch, change);
        let restored = self.run_checked(&["checkout", "--quiet", "--force", &base]);
        committed?;
        restored?;
        Ok(branch)
    }

    fn diff(&self, base: &str, branch: &str, paths: &[String]) -> Result<String> {
        let mut args = vec!["--no-pager", "diff", "--color=always", base, branch, "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_capture(&args)
    }

    #[instrument(skip(self))]
    fn push(&self, branch: &str) -> Result<()> {
        let refspec = format!("{branch}:{branch}");
        self.run_checked(&["push", "--quiet", "--force", &self.remote, &refspec])?;
        debug!(branch, remote = %self.remote, "pushed branch");
        Ok(())
    }
}
