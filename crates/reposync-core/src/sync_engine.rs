use crate::git_sync::{self, Integration};
use crate::model::{OutcomeCode, RepoOutcome, RepositoryRef, RepositoryState};
use crate::provider::{ConnectivityProbe, RemoteTransport};
use crate::remote::{Attempt, RemoteResolver};
use crate::report::{ReportEntry, RunReport};
use git2::{Repository, Signature};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

/// A step either hands its result to the next step or ends the machine with a code.
type Transition<T> = Result<T, OutcomeCode>;

pub type CheckpointReporter<'a> = dyn Fn(&ReportEntry) + 'a;

#[derive(Clone, Debug)]
pub struct SyncPolicy {
    pub initial_branch: String,
    pub committer_email: String,
    pub merge_fallback: bool,
    pub strict_provisioning: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            initial_branch: "main".to_string(),
            committer_email: "reposync@localhost".to_string(),
            merge_fallback: false,
            strict_provisioning: false,
        }
    }
}

pub fn commit_message(now: OffsetDateTime) -> String {
    let stamp = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("auto-update: {stamp}")
}

pub struct Synchronizer<'a> {
    connectivity: &'a dyn ConnectivityProbe,
    resolver: RemoteResolver<'a>,
    transport: &'a dyn RemoteTransport,
    policy: SyncPolicy,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        connectivity: &'a dyn ConnectivityProbe,
        resolver: RemoteResolver<'a>,
        transport: &'a dyn RemoteTransport,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            connectivity,
            resolver,
            transport,
            policy,
        }
    }

    /// Runs one working copy through validation, remote resolution, commit,
    /// rebase and push. Always yields exactly one outcome.
    pub async fn synchronize(&self, target: &RepositoryRef) -> RepoOutcome {
        let mut state = RepositoryState::default();
        let mut outcome = RepoOutcome::new(OutcomeCode::InvalidRepo);
        let code = match self.advance(target, &mut state, &mut outcome).await {
            Ok(code) | Err(code) => code,
        };
        outcome.code = code;
        info!(
            repo = %target.name(),
            path = %target.path().display(),
            outcome = %code,
            branch = %state.current_branch,
            remote = state.remote_available,
            created = outcome.remote_created,
            "repository synchronized"
        );
        outcome
    }

    async fn advance(
        &self,
        target: &RepositoryRef,
        state: &mut RepositoryState,
        outcome: &mut RepoOutcome,
    ) -> Transition<OutcomeCode> {
        let repo = self.validate(target)?;
        state.valid = true;
        let sig = git_sync::signature(&repo, &self.policy.committer_email).map_err(|err| {
            warn!(repo = %target.name(), error = %err, "no usable committer identity");
            OutcomeCode::CommitFailed
        })?;

        let fresh_history = self.ensure_history(&repo, target, &sig)?;
        state.current_branch = self.check_head_state(&repo, target)?;

        let resolution = self
            .resolver
            .resolve(&repo, target, &state.current_branch, self.online().await)
            .await;
        outcome.remote_created = resolution.created();
        state.remote_available = resolution.available;
        if resolution.provision_failed() && self.policy.strict_provisioning {
            return Err(OutcomeCode::RemoteCreateFailed);
        }

        state.has_local_changes = self.detect_changes(&repo, target)?;
        if !state.has_local_changes && !fresh_history {
            return Ok(if state.remote_available {
                OutcomeCode::NoChangeRemotePresent
            } else {
                OutcomeCode::NoChangeRemoteAbsent
            });
        }

        // A placeholder commit made this run is new local history even on a clean tree.
        if state.has_local_changes {
            self.stage_and_commit(&repo, target, &sig)?;
        }

        if !state.remote_available || !self.online().await {
            return Ok(OutcomeCode::LocalCommitOnly);
        }
        self.update_from_remote(&repo, target, &state.current_branch, &sig)
            .await?;

        if !self.online().await {
            debug!(repo = %target.name(), "connectivity lost before push");
            return Ok(OutcomeCode::LocalCommitOnly);
        }
        Ok(self.push(&repo, target, &state.current_branch).await)
    }

    async fn online(&self) -> bool {
        self.connectivity.is_online().await
    }

    fn validate(&self, target: &RepositoryRef) -> Transition<Repository> {
        if !git_sync::has_valid_metadata(target.path()) {
            debug!(path = %target.path().display(), "missing repository metadata");
            return Err(OutcomeCode::InvalidRepo);
        }
        git_sync::open_repo(target.path()).map_err(|err| {
            warn!(repo = %target.name(), error = %err, "cannot open repository");
            OutcomeCode::InvalidRepo
        })
    }

    /// Returns `true` when the placeholder commit was created on this call.
    fn ensure_history(
        &self,
        repo: &Repository,
        target: &RepositoryRef,
        sig: &Signature<'_>,
    ) -> Transition<bool> {
        let fail = |err: anyhow::Error| {
            warn!(repo = %target.name(), error = %err, "placeholder commit failed");
            OutcomeCode::NoCommitsInitFailed
        };
        if git_sync::has_commits(repo).map_err(fail)? {
            return Ok(false);
        }
        git_sync::create_placeholder_commit(repo, &self.policy.initial_branch, sig)
            .map(|_| true)
            .map_err(fail)
    }

    fn check_head_state(&self, repo: &Repository, target: &RepositoryRef) -> Transition<String> {
        match git_sync::current_branch(repo) {
            Ok(Some(branch)) => Ok(branch),
            Ok(None) => {
                info!(repo = %target.name(), "HEAD is detached; skipping");
                Err(OutcomeCode::DetachedHead)
            }
            Err(err) => {
                warn!(repo = %target.name(), error = %err, "cannot read HEAD");
                Err(OutcomeCode::DetachedHead)
            }
        }
    }

    fn detect_changes(&self, repo: &Repository, target: &RepositoryRef) -> Transition<bool> {
        git_sync::has_local_changes(repo).map_err(|err| {
            warn!(repo = %target.name(), error = %err, "status failed");
            OutcomeCode::CommitFailed
        })
    }

    fn stage_and_commit(
        &self,
        repo: &Repository,
        target: &RepositoryRef,
        sig: &Signature<'_>,
    ) -> Transition<()> {
        let message = commit_message(OffsetDateTime::now_utc());
        match git_sync::stage_and_commit(repo, &message, sig) {
            Ok(oid) => {
                info!(repo = %target.name(), commit = %oid, "committed local changes");
                Ok(())
            }
            Err(err) => {
                warn!(repo = %target.name(), error = %err, "commit failed");
                Err(OutcomeCode::CommitFailed)
            }
        }
    }

    async fn update_from_remote(
        &self,
        repo: &Repository,
        target: &RepositoryRef,
        branch: &str,
        sig: &Signature<'_>,
    ) -> Transition<()> {
        if let Err(err) = self.transport.fetch(target.path()).await {
            warn!(repo = %target.name(), error = %err, "fetch failed");
            return Err(OutcomeCode::RebaseConflict);
        }
        let integration = match git_sync::rebase_onto_upstream(repo, branch, sig) {
            Ok(Integration::Conflict) if self.policy.merge_fallback => {
                git_sync::merge_upstream(repo, branch, sig)
            }
            other => other,
        };
        match integration {
            Ok(Integration::Conflict) => Err(OutcomeCode::RebaseConflict),
            Ok(integration) => {
                debug!(repo = %target.name(), ?integration, "upstream integrated");
                Ok(())
            }
            Err(err) => {
                warn!(repo = %target.name(), error = %err, "rebase failed");
                Err(OutcomeCode::RebaseConflict)
            }
        }
    }

    async fn push(&self, repo: &Repository, target: &RepositoryRef, branch: &str) -> OutcomeCode {
        match self.resolver.push(repo, target, branch).await {
            Attempt::Primary(()) => OutcomeCode::Pushed,
            Attempt::Fallback(()) => {
                info!(repo = %target.name(), "push succeeded after rebinding origin");
                OutcomeCode::Pushed
            }
            Attempt::Exhausted(err) => {
                warn!(repo = %target.name(), error = %err, "push failed after fallback");
                OutcomeCode::PushFailed
            }
        }
    }
}

/// Synchronizes every repository in order, handing each entry to `checkpoint`
/// as soon as its outcome is known.
pub async fn run_fleet(
    synchronizer: &Synchronizer<'_>,
    repos: Vec<RepositoryRef>,
    started_at: OffsetDateTime,
    checkpoint: &CheckpointReporter<'_>,
) -> RunReport {
    let mut report = RunReport::new(started_at);
    let total = repos.len();
    for (index, repo) in repos.into_iter().enumerate() {
        debug!(repo = %repo.name(), position = index + 1, total, "synchronizing");
        let outcome = synchronizer.synchronize(&repo).await;
        let entry = report.record(repo, outcome);
        checkpoint(entry);
    }
    report
}
