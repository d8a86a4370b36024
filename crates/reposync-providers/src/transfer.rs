use crate::process::run_bounded;
use anyhow::Context;
use reposync_core::provider::{BulkTransfer, ProviderFuture};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// Ships a file to `<host>:<remote_dir>/` with ssh and scp, creating the
/// directory first. `host` is usually an alias from the ssh config.
#[derive(Clone, Debug)]
pub struct ScpTransfer {
    host: String,
    remote_dir: String,
    timeout: Duration,
}

impl ScpTransfer {
    pub fn new(host: impl Into<String>, remote_dir: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            remote_dir: remote_dir.into(),
            timeout,
        }
    }

    fn connect_options(&self) -> [String; 4] {
        [
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
        ]
    }

    fn mkdir_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.connect_options().into_iter().map(Into::into).collect();
        args.push(self.host.clone().into());
        args.push(format!("mkdir -p {}", shell_quote(&self.remote_dir)).into());
        args
    }

    fn copy_args(&self, file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.connect_options().into_iter().map(Into::into).collect();
        args.push("-p".into());
        args.push(file.as_os_str().to_os_string());
        args.push(format!("{}:{}/", self.host, self.remote_dir).into());
        args
    }
}

/// Single-quotes `value` for the remote shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl BulkTransfer for ScpTransfer {
    fn upload<'a>(&'a self, file: &'a Path) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut mkdir = Command::new("ssh");
            mkdir.args(self.mkdir_args());
            run_bounded(mkdir, self.timeout, None)
                .await
                .with_context(|| format!("create {}:{}", self.host, self.remote_dir))?;

            let mut copy = Command::new("scp");
            copy.args(self.copy_args(file));
            run_bounded(copy, self.timeout, None)
                .await
                .with_context(|| format!("copy {} to {}", file.display(), self.host))?;
            info!(host = %self.host, dir = %self.remote_dir, file = %file.display(), "file transferred");
            Ok(())
        })
    }
}
