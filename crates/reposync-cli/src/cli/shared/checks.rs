use super::*;

const NETWORK_TOOLS: [&str; 3] = ["git", "ssh", "scp"];

/// Everything a run needs before it may touch a repository.
pub(in crate::cli) struct Startup {
    pub(in crate::cli) config: AppConfig,
    pub(in crate::cli) credentials: Credentials,
    pub(in crate::cli) token: String,
}

pub(in crate::cli) fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

pub(in crate::cli) fn required_tools(config: &AppConfig) -> Vec<String> {
    let mut tools: Vec<String> = NETWORK_TOOLS.iter().map(|tool| tool.to_string()).collect();
    let mailer = config
        .mail_command
        .first()
        .cloned()
        .unwrap_or_else(|| "sendmail".to_string());
    if !tools.contains(&mailer) {
        tools.push(mailer);
    }
    tools
}

pub(in crate::cli) fn check_tools(tools: &[String]) -> Result<(), StartupError> {
    for tool in tools {
        match which::which(tool) {
            Ok(path) => tracing::debug!(tool = %tool, path = %path.display(), "tool found"),
            Err(_) => return Err(StartupError::MissingTool(tool.clone())),
        }
    }
    Ok(())
}

/// Config, tools, credentials, token: in that order, stopping at the first failure.
pub(in crate::cli) fn load_startup(config_path: &Path) -> anyhow::Result<Startup> {
    let config = AppConfig::load(config_path)?;
    check_tools(&required_tools(&config))?;
    let credentials = Credentials::load(&config.credentials_path()?)?;
    let token = auth::resolve_token(&config.hosting.host)?;
    Ok(Startup {
        config,
        credentials,
        token,
    })
}

pub(in crate::cli) fn handle_check(config_path: &Path, audit: &AuditLogger) -> anyhow::Result<()> {
    let startup = load_startup(config_path)?;
    let repos = discovery::discover(&startup.config.candidates)?;
    println!(
        "Startup checks passed; {} working copies listed in {}",
        repos.len(),
        startup.config.candidates.display()
    );
    audit.record(
        AuditRecord::new("check", AuditStatus::Ok)
            .details(serde_json::json!({ "repos": repos.len() })),
    )?;
    Ok(())
}
