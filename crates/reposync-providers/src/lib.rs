//! Concrete collaborators behind the seams declared in `reposync_core::provider`.

pub mod auth;
pub mod connectivity;
pub mod git_cli;
pub mod github;
pub mod http;
pub mod mail;
pub mod process;
pub mod transfer;

pub use connectivity::{FixedProbe, NetworkProbe};
pub use git_cli::GitCliTransport;
pub use github::GitHubHosting;
pub use mail::SendmailMessenger;
pub use transfer::ScpTransfer;
