use crate::error::StartupError;
use crate::remote::HostingTarget;
use crate::report::CHANNEL_LIMIT;
use crate::sync_engine::SyncPolicy;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Candidate list: one working-copy path per line.
    pub candidates: PathBuf,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    #[serde(default = "default_remote_log_dir")]
    pub remote_log_dir: String,
    pub hosting: HostingConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_initial_branch")]
    pub initial_branch: String,
    #[serde(default)]
    pub merge_fallback: bool,
    #[serde(default)]
    pub strict_provisioning: bool,
    #[serde(default = "default_mail_command")]
    pub mail_command: Vec<String>,
    #[serde(default = "default_channel_limit")]
    pub channel_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_true")]
    pub require_wireless: bool,
    #[serde(default = "default_probe_address")]
    pub probe_address: String,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            require_wireless: true,
            probe_address: default_probe_address(),
        }
    }
}

fn default_remote_log_dir() -> String {
    "reposync-logs".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_initial_branch() -> String {
    "main".to_string()
}

fn default_mail_command() -> Vec<String> {
    vec!["sendmail".to_string(), "-t".to_string()]
}

fn default_channel_limit() -> usize {
    CHANNEL_LIMIT
}

fn default_host() -> String {
    "github.com".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_probe_address() -> String {
    "8.8.8.8:53".to_string()
}

impl AppConfig {
    pub fn new(candidates: PathBuf, owner: String) -> Self {
        Self {
            candidates,
            log_dir: None,
            credentials: None,
            remote_log_dir: default_remote_log_dir(),
            hosting: HostingConfig {
                host: default_host(),
                api_url: default_api_url(),
                owner,
            },
            connectivity: ConnectivityConfig::default(),
            timeout_secs: default_timeout_secs(),
            initial_branch: default_initial_branch(),
            merge_fallback: false,
            strict_provisioning: false,
            mail_command: default_mail_command(),
            channel_limit: default_channel_limit(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(StartupError::MissingConfig(path.to_path_buf()).into());
        }
        let data = fs::read_to_string(path).context("read config")?;
        let config = serde_json::from_str(&data).map_err(|source| StartupError::Invalid {
            what: "config",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn log_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_log_dir(),
        }
    }

    pub fn credentials_path(&self) -> anyhow::Result<PathBuf> {
        match &self.credentials {
            Some(path) => Ok(path.clone()),
            None => default_credentials_path(),
        }
    }

    pub fn hosting_target(&self) -> HostingTarget {
        HostingTarget {
            host: self.hosting.host.clone(),
            owner: self.hosting.owner.clone(),
        }
    }

    pub fn sync_policy(&self, credentials: &Credentials) -> SyncPolicy {
        SyncPolicy {
            initial_branch: self.initial_branch.clone(),
            committer_email: credentials.contact_email.clone(),
            merge_fallback: self.merge_fallback,
            strict_provisioning: self.strict_provisioning,
        }
    }
}

/// The three values the notification channels need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub ssh_host: String,
    #[serde(default)]
    pub sms_gateway: String,
}

impl Credentials {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(StartupError::MissingCredentials(path.to_path_buf()).into());
        }
        let data = fs::read_to_string(path).context("read credentials")?;
        let credentials: Self =
            serde_json::from_str(&data).map_err(|source| StartupError::Invalid {
                what: "credentials",
                path: path.to_path_buf(),
                source,
            })?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        let fields = [
            ("contact_email", &self.contact_email),
            ("ssh_host", &self.ssh_host),
            ("sms_gateway", &self.sms_gateway),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(StartupError::MissingCredential(name));
            }
        }
        Ok(())
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "reposync", "reposync").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_credentials_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("credentials.json"))
}

pub fn default_log_dir() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("logs"))
}

pub fn default_audit_dir() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("audit"))
}

pub fn default_lock_path() -> anyhow::Result<PathBuf> {
    let project = project_dirs()?;
    Ok(project
        .runtime_dir()
        .unwrap_or(project.cache_dir())
        .join("reposync.lock"))
}
