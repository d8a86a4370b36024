use crate::process::run_bounded;
use reposync_core::dispatch::OutboundMessage;
use reposync_core::provider::{MessageSender, ProviderFuture};
use std::time::Duration;
use tokio::process::Command;

/// Pipes the rendered message into a sendmail-compatible command.
#[derive(Clone, Debug)]
pub struct SendmailMessenger {
    command: Vec<String>,
    timeout: Duration,
}

impl SendmailMessenger {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl MessageSender for SendmailMessenger {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let Some((program, args)) = self.command.split_first() else {
                anyhow::bail!("mail command is empty");
            };
            let mut command = Command::new(program);
            command.args(args);
            run_bounded(command, self.timeout, Some(message.render().as_bytes())).await?;
            Ok(())
        })
    }
}
