use anyhow::Context;
use keyring::Entry;
use reposync_core::error::StartupError;
use tracing::debug;

const SERVICE: &str = "reposync";
const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Hosting token for `host`: the environment first, then the OS keyring.
pub fn resolve_token(host: &str) -> anyhow::Result<String> {
    if let Some(token) = token_from_env(|name| std::env::var(name).ok()) {
        debug!(host, "using hosting token from environment");
        return Ok(token);
    }
    let entry = Entry::new(SERVICE, host).context("open keyring entry")?;
    match entry.get_password() {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Ok(_) | Err(keyring::Error::NoEntry) => {
            Err(StartupError::MissingToken(host.to_string()).into())
        }
        Err(err) => Err(err).context("read token from keyring"),
    }
}

pub fn store_token(host: &str, token: &str) -> anyhow::Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("refusing to store an empty token");
    }
    let entry = Entry::new(SERVICE, host).context("open keyring entry")?;
    entry
        .set_password(token)
        .context("write token to keyring")
}

fn token_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    TOKEN_VARS.iter().find_map(|name| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
