use crate::model::{OutcomeCode, RepositoryRef};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

const MAX_BYTES: u64 = 10 * 1024 * 1024;

pub const RUN_START: &str = "run.start";
pub const RUN_FINISH: &str = "run.finish";
pub const RUN_SKIPPED: &str = "run.skipped";
pub const REPO_OUTCOME: &str = "repo.outcome";
pub const NOTIFY_MESSAGE: &str = "notify.message";
pub const NOTIFY_BULK: &str = "notify.bulk";
pub const APP_ERROR: &str = "app.error";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AuditStatus {
    Ok,
    Failed,
    Skipped,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::Failed => "failed",
            AuditStatus::Skipped => "skipped",
        }
    }

    fn level(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "INFO",
            AuditStatus::Failed => "ERROR",
            AuditStatus::Skipped => "WARN",
        }
    }
}

/// One event to append. Built with the chained setters, then handed to
/// [`AuditLogger::record`].
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    event: &'a str,
    status: AuditStatus,
    repo: Option<&'a RepositoryRef>,
    outcome: Option<OutcomeCode>,
    details: Option<Value>,
    error: Option<String>,
}

impl<'a> AuditRecord<'a> {
    pub fn new(event: &'a str, status: AuditStatus) -> Self {
        Self {
            event,
            status,
            repo: None,
            outcome: None,
            details: None,
            error: None,
        }
    }

    pub fn repo(mut self, repo: &'a RepositoryRef) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn outcome(mut self, outcome: OutcomeCode) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

#[derive(Serialize)]
struct AuditLine<'a> {
    ts: String,
    level: &'static str,
    event: &'a str,
    audit_id: String,
    session_id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<OutcomeCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

/// Append-only JSON-lines trail, one file per day, rolled over by size.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    session_id: String,
    base_dir: PathBuf,
    max_bytes: u64,
}

impl AuditLogger {
    pub fn open(base_dir: PathBuf) -> anyhow::Result<Self> {
        Self::with_limit(base_dir, MAX_BYTES)
    }

    pub fn with_limit(base_dir: PathBuf, max_bytes: u64) -> anyhow::Result<Self> {
        fs::create_dir_all(&base_dir).context("create audit dir")?;
        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            base_dir,
            max_bytes,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Appends the record and returns its audit id.
    pub fn record(&self, record: AuditRecord<'_>) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let audit_id = Uuid::new_v4().to_string();
        let line = AuditLine {
            ts: now.format(&Rfc3339).context("format timestamp")?,
            level: record.status.level(),
            event: record.event,
            audit_id: audit_id.clone(),
            session_id: &self.session_id,
            status: record.status.as_str(),
            repo: record.repo.map(|repo| repo.name()),
            path: record.repo.map(|repo| repo.path().display().to_string()),
            outcome: record.outcome,
            error: record.error.as_deref(),
            details: record.details.as_ref(),
        };
        let date = now
            .format(&time::format_description::parse("[year][month][day]")?)
            .context("format date")?;
        let path = next_audit_path(&self.base_dir, &date, self.max_bytes);
        let serialized = serde_json::to_string(&line).context("serialize audit entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open audit log {}", path.display()))?;
        writeln!(file, "{serialized}").context("write audit entry")?;
        Ok(audit_id)
    }
}

fn next_audit_path(base_dir: &Path, date: &str, max_bytes: u64) -> PathBuf {
    let mut suffix = 0;
    loop {
        let name = if suffix == 0 {
            format!("audit-{date}.jsonl")
        } else {
            format!("audit-{date}-{suffix}.jsonl")
        };
        let path = base_dir.join(name);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.len() >= max_bytes => suffix += 1,
            _ => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_all(dir: &Path) -> String {
        let mut contents = String::new();
        for entry in fs::read_dir(dir).unwrap() {
            contents.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        contents
    }

    #[test]
    fn outcome_events_carry_repo_and_code() {
        let tmp = TempDir::new().unwrap();
        let logger = AuditLogger::open(tmp.path().to_path_buf()).unwrap();
        let repo = RepositoryRef::new("/srv/notes");
        logger
            .record(
                AuditRecord::new(REPO_OUTCOME, AuditStatus::Ok)
                    .repo(&repo)
                    .outcome(OutcomeCode::Pushed),
            )
            .unwrap();

        let contents = read_all(tmp.path());
        let line: Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(line["event"], "repo.outcome");
        assert_eq!(line["repo"], "notes");
        assert_eq!(line["outcome"], "PUSHED");
        assert_eq!(line["session_id"], logger.session_id());
        assert!(line.get("error").is_none());
    }

    #[test]
    fn rolls_over_when_file_is_full() {
        let tmp = TempDir::new().unwrap();
        let logger = AuditLogger::with_limit(tmp.path().to_path_buf(), 1).unwrap();
        for _ in 0..2 {
            logger
                .record(AuditRecord::new(RUN_START, AuditStatus::Ok))
                .unwrap();
        }
        let files = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(files, 2);
    }
}
