//! Seams to the external collaborators the synchronizer and dispatcher drive.
//!
//! Every method returns a boxed future so implementations can be swapped
//! behind `&dyn` references, including the in-memory fakes used in tests.

use crate::dispatch::OutboundMessage;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + 'a>>;
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a>>;

/// Answers whether network connectivity is usable at this moment. Never cached.
pub trait ConnectivityProbe {
    fn is_online(&self) -> ProbeFuture<'_>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

pub trait HostingService {
    fn repo_exists<'a>(&'a self, owner: &'a str, name: &'a str) -> ProviderFuture<'a, bool>;
    fn create_repo<'a>(&'a self, name: &'a str, source: &'a Path)
    -> ProviderFuture<'a, CreateOutcome>;
}

/// Network-facing version-control operations, each bounded by a timeout.
pub trait RemoteTransport {
    fn fetch<'a>(&'a self, repo: &'a Path) -> ProviderFuture<'a, ()>;
    fn push<'a>(&'a self, repo: &'a Path, branch: &'a str) -> ProviderFuture<'a, ()>;
}

pub trait MessageSender {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> ProviderFuture<'a, ()>;
}

pub trait BulkTransfer {
    fn upload<'a>(&'a self, file: &'a Path) -> ProviderFuture<'a, ()>;
}
