//! Mock version control for runner tests

use housekeeper::change::Change;
use housekeeper::error::{Error, Result};
use housekeeper::git::VersionControl;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Recorded version control operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Enter(String),
    Leave,
    Commit(String),
    Diff {
        base: String,
        branch: String,
        paths: Vec<String>,
    },
    Push(String),
}

/// Version control double recording every call.
///
/// Entering a scope while one is active fails, like the real adapter.
pub struct MockVersionControl {
    calls: Arc<Mutex<Vec<VcsCall>>>,
    in_scope: bool,
    fail_commit: HashSet<String>,
    fail_push: HashSet<String>,
}

impl MockVersionControl {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            in_scope: false,
            fail_commit: HashSet::new(),
            fail_push: HashSet::new(),
        }
    }

    /// Make committing the change for `branch` fail
    pub fn fail_commit(mut self, branch: &str) -> Self {
        self.fail_commit.insert(branch.to_string());
        self
    }

    /// Make pushing `branch` fail
    pub fn fail_push(mut self, branch: &str) -> Self {
        self.fail_push.insert(branch.to_string());
        self
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Branches committed, in order
    pub fn committed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VcsCall::Commit(branch) => Some(branch),
                _ => None,
            })
            .collect()
    }

    /// Branches pushed, in order
    pub fn pushed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VcsCall::Push(branch) => Some(branch),
                _ => None,
            })
            .collect()
    }

    /// Whether a scope is currently open
    pub const fn in_scope(&self) -> bool {
        self.in_scope
    }

    fn record(&self, call: VcsCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl VersionControl for MockVersionControl {
    fn enter_branch_scope(&mut self, base: &str) -> Result<()> {
        if self.in_scope {
            return Err(Error::VersionControl("nested branch scope".into()));
        }
        self.in_scope = true;
        self.record(VcsCall::Enter(base.to_string()));
        Ok(())
    }

    fn leave_branch_scope(&mut self) -> Result<()> {
        self.in_scope = false;
        self.record(VcsCall::Leave);
        Ok(())
    }

    fn commit_in_branch(&mut self, change: &Change) -> Result<String> {
        let branch = change.branch_name();
        if self.fail_commit.contains(&branch) {
            return Err(Error::VersionControl(format!("cannot commit {branch}")));
        }
        self.record(VcsCall::Commit(branch.clone()));
        Ok(branch)
    }

    fn diff(&self, base: &str, branch: &str, paths: &[String]) -> Result<String> {
        self.record(VcsCall::Diff {
            base: base.to_string(),
            branch: branch.to_string(),
            paths: paths.to_vec(),
        });
        Ok(format!("diff {base}..{branch}"))
    }

    fn push(&self, branch: &str) -> Result<()> {
        if self.fail_push.contains(branch) {
            return Err(Error::VersionControl(format!("cannot push {branch}")));
        }
        self.record(VcsCall::Push(branch.to_string()));
        Ok(())
    }
}
