//! Keeps implemented as external commands
//!
//! The command runs in the repository root, edits files in place and prints
//! one JSON-encoded change per line on stdout. After each change it should
//! read a line from stdin before touching the working tree again: the runner
//! writes that line only once it has committed the previous change. Its
//! stderr is passed through so the operator sees its progress.

use super::{ChangeStream, Keep};
use crate::change::Change;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

/// A keep declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepDefinition {
    /// Keep name
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
}

/// Keep backed by an external process
#[derive(Debug, Clone)]
pub struct CommandKeep {
    definition: KeepDefinition,
    workdir: PathBuf,
}

impl CommandKeep {
    /// Create a keep that runs `definition.command` inside `workdir`
    pub fn new(definition: KeepDefinition, workdir: impl Into<PathBuf>) -> Self {
        Self {
            definition,
            workdir: workdir.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::KeepGeneration {
            keep: self.definition.name.clone(),
            message: message.into(),
        }
    }
}

impl Keep for CommandKeep {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn changes(&mut self) -> Result<ChangeStream<'_>> {
        let (program, args) = self
            .definition
            .command
            .split_first()
            .ok_or_else(|| self.error("no command configured"))?;

        debug!(keep = %self.definition.name, %program, "spawning keep");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.error(format!("failed to spawn {program}: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.error("stdout was not piped"));
        };

        let stdin = child.stdin.take();
        Ok(Box::new(CommandChangeStream {
            keep: self.definition.name.clone(),
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            awaiting_ack: false,
            finished: false,
        }))
    }
}

/// Reads changes from a running keep process, one line at a time
struct CommandChangeStream {
    keep: String,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    /// A change was handed out and the keep is waiting to continue
    awaiting_ack: bool,
    finished: bool,
}

impl CommandChangeStream {
    /// Let the keep move on to its next change.
    ///
    /// Keeps that never read stdin may already have exited; a broken pipe
    /// is expected then and the exit status is checked at end of output.
    fn acknowledge(&mut self) {
        if !std::mem::take(&mut self.awaiting_ack) {
            return;
        }
        if let Some(stdin) = self.stdin.as_mut() {
            if let Err(e) = stdin.write_all(b"\n").and_then(|()| stdin.flush()) {
                debug!(keep = %self.keep, error = %e, "keep is not reading acknowledgements");
                self.stdin = None;
            }
        }
    }

    fn fail(&mut self, message: String) -> Option<Result<Change>> {
        self.finished = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
        Some(Err(Error::KeepGeneration {
            keep: self.keep.clone(),
            message,
        }))
    }
}

impl Iterator for CommandChangeStream {
    type Item = Result<Change>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.acknowledge();

        loop {
            match self.lines.next() {
                Some(Ok(line)) if line.trim().is_empty() => {}
                Some(Ok(line)) => {
                    return match serde_json::from_str::<Change>(&line) {
                        Ok(change) => {
                            self.awaiting_ack = true;
                            Some(Ok(change))
                        }
                        Err(e) => self.fail(format!("malformed change: {e}")),
                    };
                }
                Some(Err(e)) => return self.fail(format!("failed to read output: {e}")),
                None => {
                    self.finished = true;
                    self.stdin = None;
                    return match self.child.wait() {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some(Err(Error::KeepGeneration {
                            keep: self.keep.clone(),
                            message: format!("exited with {status}"),
                        })),
                        Err(e) => Some(Err(Error::KeepGeneration {
                            keep: self.keep.clone(),
                            message: format!("failed to wait: {e}"),
                        })),
                    };
                }
            }
        }
    }
}

impl Drop for CommandChangeStream {
    fn drop(&mut self) {
        if !self.finished {
            // Runner stopped early (max MRs reached); the keep has no more work to do.
            debug!(keep = %self.keep, "stopping keep before it finished");
            if let Err(e) = self.child.kill() {
                warn!(keep = %self.keep, error = %e, "failed to stop keep");
            }
            let _ = self.child.wait();
        }
    }
}
