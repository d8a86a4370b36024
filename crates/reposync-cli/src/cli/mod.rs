use crate::logging;
use anyhow::Context;
use clap::Parser;
use reposync_core::audit::{self, AuditLogger, AuditRecord, AuditStatus};
use reposync_core::config::{
    AppConfig, Credentials, default_audit_dir, default_config_path, default_lock_path,
};
use reposync_core::discovery;
use reposync_core::error::StartupError;
use reposync_providers::auth;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod app;
mod args;
mod config_cmd;
mod run_cmd;
mod shared;
mod token_cmd;

use args::*;

use config_cmd::handle_config;
use run_cmd::handle_run;
use shared::{Startup, handle_check, load_startup, resolve_config_path};
use token_cmd::handle_token;

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
