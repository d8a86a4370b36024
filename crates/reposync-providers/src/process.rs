use anyhow::{Context, bail};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs `command` to completion within `timeout`, optionally feeding `input` on
/// stdin. A timeout kills the child and counts as failure, as does a non-zero exit.
pub async fn run_bounded(
    mut command: Command,
    timeout: Duration,
    input: Option<&[u8]>,
) -> anyhow::Result<Output> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();
    command
        .kill_on_drop(true)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("spawn {program}"))?;
    let stdin = child.stdin.take();
    let label = program.as_str();
    let exchange = async move {
        if let Some(input) = input
            && let Some(mut stdin) = stdin
        {
            stdin
                .write_all(input)
                .await
                .with_context(|| format!("write stdin of {label}"))?;
        }
        child
            .wait_with_output()
            .await
            .with_context(|| format!("wait for {label}"))
    };

    // The stdin write counts against the bound; dropping the child kills it.
    let output = match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result?,
        Err(_) => bail!("{program} timed out after {}s", timeout.as_secs()),
    };
    debug!(
        program = %program,
        status = ?output.status.code(),
        stdout = %String::from_utf8_lossy(&output.stdout).trim(),
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "process finished"
    );
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}
