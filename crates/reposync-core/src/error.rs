use std::path::PathBuf;
use thiserror::Error;

/// Preconditions that abort a run before any repository is touched.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required tool `{0}` not found on PATH")]
    MissingTool(String),
    #[error("config file not found: {}", .0.display())]
    MissingConfig(PathBuf),
    #[error("credentials file not found: {}", .0.display())]
    MissingCredentials(PathBuf),
    #[error("credential `{0}` is missing or empty")]
    MissingCredential(&'static str),
    #[error("candidate list not found: {}", .0.display())]
    MissingCandidates(PathBuf),
    #[error("no hosting token for {0}; set GITHUB_TOKEN or run `reposync token set`")]
    MissingToken(String),
    #[error("invalid {what} at {}: {source}", path.display())]
    Invalid {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// True when any cause in the chain is a [`StartupError`].
pub fn is_startup_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<StartupError>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn detects_startup_error_through_context() {
        let err = Err::<(), _>(StartupError::MissingCredential("sms_gateway"))
            .context("load credentials")
            .unwrap_err();
        assert!(is_startup_error(&err));
        assert!(!is_startup_error(&anyhow::anyhow!("network down")));
    }
}
