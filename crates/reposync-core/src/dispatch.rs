use crate::provider::{BulkTransfer, MessageSender};
use crate::report::SummaryText;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn from_summary(to: &str, from: &str, subject: String, summary: &SummaryText) -> Self {
        Self {
            to: to.to_string(),
            from: from.to_string(),
            subject,
            body: summary.as_str().to_string(),
        }
    }

    /// Header block, blank line, body: the shape a `sendmail -t` relay reads.
    pub fn render(&self) -> String {
        format!(
            "To: {}\nFrom: {}\nSubject: {}\n\n{}\n",
            self.to, self.from, self.subject, self.body
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchReport {
    pub message_sent: bool,
    pub log_delivered: bool,
    pub log_purged: bool,
}

pub struct Dispatcher<'a> {
    messenger: &'a dyn MessageSender,
    bulk: &'a dyn BulkTransfer,
}

impl<'a> Dispatcher<'a> {
    pub fn new(messenger: &'a dyn MessageSender, bulk: &'a dyn BulkTransfer) -> Self {
        Self { messenger, bulk }
    }

    /// Sends the summary and ships the detail log. Failures on either channel are
    /// logged and reported, never returned; the local log survives a failed transfer.
    pub async fn dispatch(&self, message: &OutboundMessage, detail_log: &Path) -> DispatchReport {
        let mut report = DispatchReport::default();
        match self.messenger.send(message).await {
            Ok(()) => {
                info!(to = %message.to, chars = message.body.chars().count(), "summary sent");
                report.message_sent = true;
            }
            Err(err) => warn!(to = %message.to, error = %err, "summary delivery failed"),
        }

        match self.bulk.upload(detail_log).await {
            Ok(()) => {
                report.log_delivered = true;
                info!(log = %detail_log.display(), "detail log transferred");
                match fs::remove_file(detail_log) {
                    Ok(()) => report.log_purged = true,
                    Err(err) => {
                        warn!(log = %detail_log.display(), error = %err, "could not remove local detail log")
                    }
                }
            }
            Err(err) => warn!(
                log = %detail_log.display(),
                error = %err,
                "detail log transfer failed; keeping local copy"
            ),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderFuture;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingMessenger {
        fail: bool,
        sent: RefCell<Vec<String>>,
    }

    impl MessageSender for RecordingMessenger {
        fn send<'a>(&'a self, message: &'a OutboundMessage) -> ProviderFuture<'a, ()> {
            Box::pin(async move {
                if self.fail {
                    anyhow::bail!("relay refused");
                }
                self.sent.borrow_mut().push(message.render());
                Ok(())
            })
        }
    }

    struct StubTransfer {
        fail: bool,
    }

    impl BulkTransfer for StubTransfer {
        fn upload<'a>(&'a self, file: &'a Path) -> ProviderFuture<'a, ()> {
            Box::pin(async move {
                if self.fail {
                    anyhow::bail!("ssh: connect to host timed out");
                }
                assert!(file.exists());
                Ok(())
            })
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::from_summary(
            "5551234567@sms.example.net",
            "dev@example.com",
            "reposync 2026-10-18 07:00".to_string(),
            &SummaryText::Compacted("pushed 3/3".to_string()),
        )
    }

    #[test]
    fn render_has_headers_then_body() {
        assert_eq!(
            message().render(),
            "To: 5551234567@sms.example.net\nFrom: dev@example.com\nSubject: reposync 2026-10-18 07:00\n\npushed 3/3\n"
        );
    }

    #[tokio::test]
    async fn delivered_log_is_purged() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("run.log");
        fs::write(&log, "notes: pushed\n").unwrap();
        let messenger = RecordingMessenger::default();
        let transfer = StubTransfer { fail: false };

        let report = Dispatcher::new(&messenger, &transfer)
            .dispatch(&message(), &log)
            .await;
        assert!(report.message_sent);
        assert!(report.log_delivered);
        assert!(report.log_purged);
        assert!(!log.exists());
        assert_eq!(messenger.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn failed_transfer_keeps_log_and_failures_do_not_propagate() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("run.log");
        fs::write(&log, "notes: pushed\n").unwrap();
        let messenger = RecordingMessenger {
            fail: true,
            ..RecordingMessenger::default()
        };
        let transfer = StubTransfer { fail: true };

        let report = Dispatcher::new(&messenger, &transfer)
            .dispatch(&message(), &log)
            .await;
        assert_eq!(report, DispatchReport::default());
        assert!(log.exists());
    }
}
