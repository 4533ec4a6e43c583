//! Shared test utilities

#![allow(dead_code)]

mod mock_hosting;
mod mock_vcs;

pub use mock_hosting::{MockHostingClient, PublishCall, QueryCall};
pub use mock_vcs::{MockVersionControl, VcsCall};

use housekeeper::change::Change;
use housekeeper::error::{Error, Result};
use housekeeper::keep::{ChangeStream, Keep};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Build a change with the usual test defaults.
///
/// `identifiers` is split on whitespace, so `"the identifier"` yields the
/// branch `the-identifier`.
pub fn make_change(identifiers: &str, title: &str) -> Change {
    Change {
        identifiers: identifiers.split_whitespace().map(String::from).collect(),
        title: title.to_string(),
        description: format!("{title} description"),
        changed_files: vec!["change1.txt".to_string(), "change2.txt".to_string()],
        labels: vec!["some-label-1".to_string(), "some-label-2".to_string()],
        reviewers: vec!["thegitlabreviewer".to_string()],
        changelog_type: None,
    }
}

/// One scripted item of a [`FakeKeep`]
#[derive(Debug, Clone)]
pub enum FakeItem {
    /// Yield this change
    Change(Change),
    /// Yield a keep error, ending the stream
    Fail(String),
}

/// In-memory keep yielding a scripted list of items
pub struct FakeKeep {
    name: String,
    items: Vec<FakeItem>,
    fail_to_start: bool,
    pulled: Arc<AtomicUsize>,
}

impl FakeKeep {
    pub fn new(name: &str, changes: Vec<Change>) -> Self {
        Self::scripted(name, changes.into_iter().map(FakeItem::Change).collect())
    }

    pub fn scripted(name: &str, items: Vec<FakeItem>) -> Self {
        Self {
            name: name.to_string(),
            items,
            fail_to_start: false,
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A keep whose `changes()` call itself fails
    pub fn failing_to_start(name: &str) -> Self {
        Self {
            fail_to_start: true,
            ..Self::new(name, Vec::new())
        }
    }

    /// Counter of items pulled from this keep's stream
    pub fn pulled(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulled)
    }

    pub fn boxed(self) -> Box<dyn Keep> {
        Box::new(self)
    }
}

impl Keep for FakeKeep {
    fn name(&self) -> &str {
        &self.name
    }

    fn changes(&mut self) -> Result<ChangeStream<'_>> {
        if self.fail_to_start {
            return Err(Error::KeepGeneration {
                keep: self.name.clone(),
                message: "failed to start".to_string(),
            });
        }
        let keep = self.name.clone();
        let pulled = Arc::clone(&self.pulled);
        Ok(Box::new(self.items.clone().into_iter().map(move |item| {
            pulled.fetch_add(1, Ordering::SeqCst);
            match item {
                FakeItem::Change(change) => Ok(change),
                FakeItem::Fail(message) => Err(Error::KeepGeneration {
                    keep: keep.clone(),
                    message,
                }),
            }
        })))
    }
}

/// Keep that edits the working tree right before yielding each change,
/// like a real keep does
pub struct WritingKeep {
    workdir: PathBuf,
    edits: Vec<(Change, Vec<(String, String)>)>,
}

impl WritingKeep {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            edits: Vec::new(),
        }
    }

    /// Yield `change` after writing each `(path, content)` pair
    pub fn with_change(mut self, change: Change, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
            .collect();
        self.edits.push((change, files));
        self
    }

    pub fn boxed(self) -> Box<dyn Keep> {
        Box::new(self)
    }
}

impl Keep for WritingKeep {
    fn name(&self) -> &str {
        "writing-keep"
    }

    fn changes(&mut self) -> Result<ChangeStream<'_>> {
        let workdir = self.workdir.clone();
        Ok(Box::new(self.edits.clone().into_iter().map(
            move |(change, files)| {
                for (path, content) in files {
                    fs::write(workdir.join(path), content)?;
                }
                Ok(change)
            },
        )))
    }
}

/// Temporary git repository with a bare `housekeeper` remote
pub struct TempGitRepo {
    dir: TempDir,
    work: PathBuf,
    remote: PathBuf,
}

impl TempGitRepo {
    /// Create a repository on `master` with one commit and a bare remote
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let work = dir.path().join("work");
        let remote = dir.path().join("remote.git");
        fs::create_dir(&work).expect("Failed to create work dir");

        git(dir.path(), &["init", "-q", "--bare", "-b", "master", "remote.git"]);
        git(&work, &["init", "-q", "-b", "master"]);
        git(&work, &["config", "user.name", "Test User"]);
        git(&work, &["config", "user.email", "test@example.com"]);
        git(&work, &["config", "commit.gpgsign", "false"]);

        fs::write(work.join("README.md"), "# test\n").expect("Failed to write README");
        git(&work, &["add", "README.md"]);
        git(&work, &["commit", "-q", "-m", "Initial commit"]);
        git(
            &work,
            &["remote", "add", "housekeeper", remote.to_str().expect("utf-8 path")],
        );

        Self { dir, work, remote }
    }

    /// Working tree path
    pub fn path(&self) -> &Path {
        &self.work
    }

    /// Bare remote path
    pub fn remote_path(&self) -> &Path {
        &self.remote
    }

    /// Directory containing both the work tree and the remote
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file in the working tree
    pub fn write(&self, path: &str, content: &str) {
        let full = self.work.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(full, content).expect("Failed to write file");
    }

    /// Read a file from the working tree, if present
    pub fn read(&self, path: &str) -> Option<String> {
        fs::read_to_string(self.work.join(path)).ok()
    }

    /// Commit everything in the working tree
    pub fn commit_all(&self, message: &str) {
        git(&self.work, &["add", "--all"]);
        git(&self.work, &["commit", "-q", "-m", message]);
    }

    /// Run git in the working tree and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> String {
        git(&self.work, args)
    }

    /// Run git in the bare remote and return trimmed stdout
    pub fn remote_git(&self, args: &[&str]) -> String {
        git(&self.remote, args)
    }

    /// Commit a branch points at
    pub fn rev(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev])
    }

    /// Currently checked out branch
    pub fn current_branch(&self) -> String {
        self.git(&["branch", "--show-current"])
    }

    /// Porcelain status output (empty when clean)
    pub fn status(&self) -> String {
        self.git(&["status", "--porcelain", "-uall"])
    }

    /// Files changed by the tip commit of `rev`
    pub fn files_in_commit(&self, rev: &str) -> Vec<String> {
        self.git(&["show", "--name-only", "--pretty=format:", rev])
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }

    /// Content of `path` at `rev`
    pub fn show(&self, rev: &str, path: &str) -> String {
        self.git(&["show", &format!("{rev}:{path}")])
    }
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
