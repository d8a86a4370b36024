use crate::process::run_bounded;
use reposync_core::git_sync::ORIGIN;
use reposync_core::provider::{ProviderFuture, RemoteTransport};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Network half of the version-control collaborator: fetch and push through
/// the `git` binary, never prompting and never outliving the timeout.
#[derive(Clone, Debug)]
pub struct GitCliTransport {
    timeout: Duration,
}

impl GitCliTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, repo: &Path) -> Command {
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_SSH_COMMAND", ssh_command(self.timeout));
        command
    }
}

pub(crate) fn ssh_command(timeout: Duration) -> String {
    format!(
        "ssh -o BatchMode=yes -o ConnectTimeout={} -o StrictHostKeyChecking=accept-new",
        timeout.as_secs().max(1)
    )
}

impl RemoteTransport for GitCliTransport {
    fn fetch<'a>(&'a self, repo: &'a Path) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut command = self.command(repo);
            command.args(["fetch", "--prune", ORIGIN]);
            run_bounded(command, self.timeout, None).await?;
            info!(repo = %repo.display(), "fetched origin");
            Ok(())
        })
    }

    fn push<'a>(&'a self, repo: &'a Path, branch: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut command = self.command(repo);
            command.args(["push", "--set-upstream", ORIGIN, branch]);
            run_bounded(command, self.timeout, None).await?;
            info!(repo = %repo.display(), branch, "pushed to origin");
            Ok(())
        })
    }
}
