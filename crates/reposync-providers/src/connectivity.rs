use reposync_core::provider::{ConnectivityProbe, ProbeFuture};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const WIRELESS_TABLE: &str = "/proc/net/wireless";

/// Live probe: an associated wireless interface (when required) and a TCP
/// connection to a fixed public address. Evaluated afresh on every call.
#[derive(Clone, Debug)]
pub struct NetworkProbe {
    require_wireless: bool,
    address: String,
    timeout: Duration,
    wireless_table: PathBuf,
}

impl NetworkProbe {
    pub fn new(require_wireless: bool, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            require_wireless,
            address: address.into(),
            timeout,
            wireless_table: PathBuf::from(WIRELESS_TABLE),
        }
    }

    pub fn with_wireless_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.wireless_table = path.into();
        self
    }

    fn wireless_associated(&self) -> bool {
        match fs::read_to_string(&self.wireless_table) {
            Ok(contents) => has_associated_interface(&contents),
            Err(err) => {
                debug!(path = %self.wireless_table.display(), error = %err, "wireless table unreadable");
                false
            }
        }
    }

    async fn reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(address = %self.address, error = %err, "reachability check failed");
                false
            }
            Err(_) => {
                debug!(address = %self.address, "reachability check timed out");
                false
            }
        }
    }
}

impl ConnectivityProbe for NetworkProbe {
    fn is_online(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            if self.require_wireless && !self.wireless_associated() {
                debug!("no associated wireless interface");
                return false;
            }
            self.reachable().await
        })
    }
}

/// Fixed answer, for `--force-offline` runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedProbe(pub bool);

impl ConnectivityProbe for FixedProbe {
    fn is_online(&self) -> ProbeFuture<'_> {
        let online = self.0;
        Box::pin(async move { online })
    }
}

/// Rows after the two header lines are `iface: status link level noise ...`;
/// a non-zero link quality means the interface is associated.
fn has_associated_interface(table: &str) -> bool {
    table.lines().skip(2).any(|line| {
        let Some((_, fields)) = line.split_once(':') else {
            return false;
        };
        fields
            .split_whitespace()
            .nth(1)
            .and_then(|link| link.trim_end_matches('.').parse::<f32>().ok())
            .is_some_and(|link| link > 0.0)
    })
}
