use crate::paths::short_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A working copy selected for this run. Identity is the path.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct RepositoryRef {
    path: PathBuf,
    name: String,
}

impl RepositoryRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = short_name(&path);
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Classification gathered while one repository moves through the state machine.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RepositoryState {
    pub valid: bool,
    pub remote_available: bool,
    pub has_local_changes: bool,
    pub current_branch: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeCode {
    InvalidRepo,
    NoCommitsInitFailed,
    DetachedHead,
    NoChangeRemoteAbsent,
    NoChangeRemotePresent,
    CommitFailed,
    Pushed,
    LocalCommitOnly,
    RebaseConflict,
    PushFailed,
    RemoteCreateFailed,
}

impl OutcomeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::InvalidRepo => "INVALID_REPO",
            OutcomeCode::NoCommitsInitFailed => "NO_COMMITS_INIT_FAILED",
            OutcomeCode::DetachedHead => "DETACHED_HEAD",
            OutcomeCode::NoChangeRemoteAbsent => "NO_CHANGE_REMOTE_ABSENT",
            OutcomeCode::NoChangeRemotePresent => "NO_CHANGE_REMOTE_PRESENT",
            OutcomeCode::CommitFailed => "COMMIT_FAILED",
            OutcomeCode::Pushed => "PUSHED",
            OutcomeCode::LocalCommitOnly => "LOCAL_COMMIT_ONLY",
            OutcomeCode::RebaseConflict => "REBASE_CONFLICT",
            OutcomeCode::PushFailed => "PUSH_FAILED",
            OutcomeCode::RemoteCreateFailed => "REMOTE_CREATE_FAILED",
        }
    }

    /// Short wording used in detail lines.
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeCode::InvalidRepo => "invalid repo",
            OutcomeCode::NoCommitsInitFailed => "init commit failed",
            OutcomeCode::DetachedHead => "detached head",
            OutcomeCode::NoChangeRemoteAbsent => "no change, no remote",
            OutcomeCode::NoChangeRemotePresent => "no change",
            OutcomeCode::CommitFailed => "commit failed",
            OutcomeCode::Pushed => "pushed",
            OutcomeCode::LocalCommitOnly => "committed locally",
            OutcomeCode::RebaseConflict => "rebase conflict",
            OutcomeCode::PushFailed => "push failed",
            OutcomeCode::RemoteCreateFailed => "remote create failed",
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one synchronizer invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RepoOutcome {
    pub code: OutcomeCode,
    /// A hosted repository was created for this working copy during the run.
    pub remote_created: bool,
}

impl RepoOutcome {
    pub fn new(code: OutcomeCode) -> Self {
        Self {
            code,
            remote_created: false,
        }
    }
}
