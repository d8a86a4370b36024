use crate::git_sync::{self, bind_origin, origin_url};
use crate::model::RepositoryRef;
use crate::paths::proposed_repo_name;
use crate::provider::{CreateOutcome, HostingService, RemoteTransport};
use git2::Repository;
use std::future::Future;
use tracing::{debug, info, warn};

/// Where hosted repositories live: the service host and the owning account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostingTarget {
    pub host: String,
    pub owner: String,
}

impl HostingTarget {
    /// The SSH address a hosted repository named `name` is expected to have.
    pub fn convention_url(&self, name: &str) -> String {
        format!("git@{}:{}/{}.git", self.host, self.owner, name)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProvisionReport {
    pub created: bool,
    pub pushed: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RemoteResolution {
    pub available: bool,
    pub provisioned: Option<ProvisionReport>,
}

impl RemoteResolution {
    pub fn created(&self) -> bool {
        self.provisioned.is_some_and(|report| report.created)
    }

    pub fn provision_failed(&self) -> bool {
        self.provisioned.is_some() && !self.available
    }
}

/// Result of a primary attempt followed by at most one fallback.
#[derive(Debug)]
pub enum Attempt<T> {
    Primary(T),
    Fallback(T),
    Exhausted(anyhow::Error),
}

impl<T> Attempt<T> {
    pub fn succeeded(&self) -> bool {
        !matches!(self, Attempt::Exhausted(_))
    }
}

/// Runs `primary`; on failure hands its error to `fallback` and runs that once.
pub async fn try_with_fallback<T, P, F, Fut>(primary: P, fallback: F) -> Attempt<T>
where
    P: Future<Output = anyhow::Result<T>>,
    F: FnOnce(anyhow::Error) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    match primary.await {
        Ok(value) => Attempt::Primary(value),
        Err(err) => match fallback(err).await {
            Ok(value) => Attempt::Fallback(value),
            Err(err) => Attempt::Exhausted(err),
        },
    }
}

/// Splits `owner/name` out of an SSH or HTTPS remote URL.
pub fn parse_remote_slug(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut parts = trimmed.rsplit(['/', ':']);
    let name = parts.next()?;
    let owner = parts.next()?;
    if name.is_empty() || owner.is_empty() || owner.contains('@') {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

pub struct RemoteResolver<'a> {
    hosting: &'a dyn HostingService,
    transport: &'a dyn RemoteTransport,
    target: &'a HostingTarget,
}

impl<'a> RemoteResolver<'a> {
    pub fn new(
        hosting: &'a dyn HostingService,
        transport: &'a dyn RemoteTransport,
        target: &'a HostingTarget,
    ) -> Self {
        Self {
            hosting,
            transport,
            target,
        }
    }

    pub fn target(&self) -> &HostingTarget {
        self.target
    }

    /// `origin` exists, points at the hosting service, and the service confirms it.
    pub async fn has_usable_remote(&self, repo: &Repository) -> bool {
        let Some(url) = origin_url(repo) else {
            debug!("no origin remote");
            return false;
        };
        if !url.contains(self.target.host.as_str()) {
            debug!(url = %url, host = %self.target.host, "origin is not on the hosting service");
            return false;
        }
        let Some((owner, name)) = parse_remote_slug(&url) else {
            debug!(url = %url, "origin url has no owner/name");
            return false;
        };
        match self.hosting.repo_exists(&owner, &name).await {
            Ok(exists) => {
                if !exists {
                    debug!(owner = %owner, name = %name, "hosted repository not found");
                }
                exists
            }
            Err(err) => {
                warn!(owner = %owner, name = %name, error = %err, "hosting query failed");
                false
            }
        }
    }

    /// Creates the hosted repository, then binds `origin` by convention and pushes.
    /// A failed or redundant create still goes on to bind and push.
    pub async fn provision_remote(
        &self,
        repo: &Repository,
        target: &RepositoryRef,
        branch: &str,
        proposed_name: &str,
    ) -> ProvisionReport {
        let created = match self.hosting.create_repo(proposed_name, target.path()).await {
            Ok(CreateOutcome::Created) => {
                info!(repo = %target.name(), name = proposed_name, "created hosted repository");
                true
            }
            Ok(CreateOutcome::AlreadyExists) => {
                info!(repo = %target.name(), name = proposed_name, "hosted repository already exists");
                false
            }
            Err(err) => {
                warn!(repo = %target.name(), name = proposed_name, error = %err, "create hosted repository failed");
                false
            }
        };

        let url = self.target.convention_url(proposed_name);
        if let Err(err) = bind_origin(repo, &url) {
            warn!(repo = %target.name(), error = %err, "binding origin failed");
            return ProvisionReport {
                created,
                pushed: false,
            };
        }
        let pushed = match self.transport.push(target.path(), branch).await {
            Ok(()) => true,
            Err(err) => {
                warn!(repo = %target.name(), error = %err, "initial push failed");
                false
            }
        };
        ProvisionReport { created, pushed }
    }

    /// Decides whether a remote is available, provisioning one at most once.
    pub async fn resolve(
        &self,
        repo: &Repository,
        target: &RepositoryRef,
        branch: &str,
        online: bool,
    ) -> RemoteResolution {
        if !online {
            debug!(repo = %target.name(), "offline; treating remote as unavailable");
            return RemoteResolution::default();
        }
        if self.has_usable_remote(repo).await {
            return RemoteResolution {
                available: true,
                provisioned: None,
            };
        }
        let name = proposed_repo_name(target.name());
        let report = self.provision_remote(repo, target, branch, &name).await;
        let available = self.has_usable_remote(repo).await;
        RemoteResolution {
            available,
            provisioned: Some(report),
        }
    }

    /// Convention address for an already-bound repository: keeps the hosted
    /// name from `origin` when it has one, else uses the proposed name.
    pub fn fallback_url(&self, repo: &Repository, target: &RepositoryRef) -> String {
        let name = origin_url(repo)
            .and_then(|url| parse_remote_slug(&url))
            .map(|(_, name)| name)
            .unwrap_or_else(|| proposed_repo_name(target.name()));
        self.target.convention_url(&name)
    }

    pub async fn push(&self, repo: &Repository, target: &RepositoryRef, branch: &str) -> Attempt<()> {
        try_with_fallback(self.transport.push(target.path(), branch), |err| async move {
            warn!(repo = %target.name(), error = %err, "push failed; rebinding origin and retrying");
            let url = self.fallback_url(repo, target);
            git_sync::bind_origin(repo, &url)?;
            self.transport.push(target.path(), branch).await
        })
        .await
    }
}
