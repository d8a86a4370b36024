use crate::model::{OutcomeCode, RepoOutcome, RepositoryRef};
use anyhow::Context;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Size bound of the text-messaging channel, in characters.
pub const CHANNEL_LIMIT: usize = 160;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Tally {
    pub pushed: u32,
    pub no_change: u32,
    pub local_only: u32,
    pub conflict: u32,
    pub push_failed: u32,
    pub remote_missing: u32,
    pub created: u32,
    pub other_error: u32,
}

impl Tally {
    fn record(&mut self, outcome: RepoOutcome) {
        match outcome.code {
            OutcomeCode::Pushed => self.pushed += 1,
            OutcomeCode::NoChangeRemotePresent => self.no_change += 1,
            OutcomeCode::NoChangeRemoteAbsent => self.remote_missing += 1,
            OutcomeCode::LocalCommitOnly => self.local_only += 1,
            OutcomeCode::RebaseConflict => self.conflict += 1,
            OutcomeCode::PushFailed => self.push_failed += 1,
            OutcomeCode::InvalidRepo
            | OutcomeCode::NoCommitsInitFailed
            | OutcomeCode::DetachedHead
            | OutcomeCode::CommitFailed
            | OutcomeCode::RemoteCreateFailed => self.other_error += 1,
        }
        if outcome.remote_created {
            self.created += 1;
        }
    }

    pub fn errors(&self) -> u32 {
        self.push_failed + self.other_error
    }

    /// Count-only line in the fixed field order, zero-valued fields omitted.
    pub fn compact_line(&self, total: usize) -> String {
        let fields = [
            ("pushed", self.pushed),
            ("no-change", self.no_change),
            ("local", self.local_only),
            ("conflict", self.conflict),
            ("errors", self.errors()),
            ("remote-missing", self.remote_missing),
            ("created", self.created),
        ];
        let parts: Vec<String> = fields
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| format!("{label} {count}/{total}"))
            .collect();
        if parts.is_empty() {
            format!("no repositories 0/{total}")
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportEntry {
    pub repo: RepositoryRef,
    pub outcome: RepoOutcome,
}

impl ReportEntry {
    pub fn detail_line(&self) -> String {
        format!("{}: {}", self.repo.name(), self.outcome.code.label())
    }
}

/// Outcomes collected while the run is in progress.
#[derive(Debug)]
pub struct RunReport {
    started_at: OffsetDateTime,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new(started_at: OffsetDateTime) -> Self {
        Self {
            started_at,
            entries: Vec::new(),
        }
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn record(&mut self, repo: RepositoryRef, outcome: RepoOutcome) -> &ReportEntry {
        self.entries.push(ReportEntry { repo, outcome });
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the report; the result can no longer be appended to.
    pub fn finalize(self, finished_at: OffsetDateTime) -> FinalReport {
        let mut tally = Tally::default();
        for entry in &self.entries {
            tally.record(entry.outcome);
        }
        FinalReport {
            started_at: self.started_at,
            finished_at,
            total: self.entries.len(),
            entries: self.entries,
            tally,
        }
    }
}

#[derive(Debug)]
pub struct FinalReport {
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    entries: Vec<ReportEntry>,
    tally: Tally,
    total: usize,
}

impl FinalReport {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn finished_at(&self) -> OffsetDateTime {
        self.finished_at
    }

    pub fn detail_text(&self) -> String {
        self.entries
            .iter()
            .map(ReportEntry::detail_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summary(&self, limit: usize) -> SummaryText {
        SummaryText::Detail(self.detail_text()).fit(limit, &self.tally, self.total)
    }
}

/// Body of the outbound message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SummaryText {
    Detail(String),
    Compacted(String),
}

impl SummaryText {
    pub fn as_str(&self) -> &str {
        match self {
            SummaryText::Detail(text) | SummaryText::Compacted(text) => text,
        }
    }

    pub fn is_compacted(&self) -> bool {
        matches!(self, SummaryText::Compacted(_))
    }

    /// Compacts only when the text is longer than `limit` characters.
    pub fn fit(self, limit: usize, tally: &Tally, total: usize) -> Self {
        if self.as_str().chars().count() > limit {
            self.compact(tally, total)
        } else {
            self
        }
    }

    /// Replaces detail with the tally line; an already compacted text is returned as is.
    pub fn compact(self, tally: &Tally, total: usize) -> Self {
        match self {
            SummaryText::Detail(_) => SummaryText::Compacted(tally.compact_line(total)),
            compacted @ SummaryText::Compacted(_) => compacted,
        }
    }
}

/// Append-only per-run log on disk, written at repository and run checkpoints.
#[derive(Debug)]
pub struct DetailLog {
    path: PathBuf,
}

impl DetailLog {
    pub fn create(dir: &Path, started_at: OffsetDateTime) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).context("create log directory")?;
        let stamp = started_at
            .format(&time::format_description::parse(
                "[year][month][day]-[hour][minute][second]",
            )?)
            .context("format log timestamp")?;
        let path = dir.join(format!("reposync-{stamp}.log"));
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .with_context(|| format!("create detail log {}", path.display()))?;
        writeln!(file, "reposync run started {started_at}").context("write log header")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open detail log {}", self.path.display()))?;
        writeln!(file, "{line}").context("append detail log")?;
        Ok(())
    }

    pub fn checkpoint(&self, entry: &ReportEntry) -> anyhow::Result<()> {
        self.append(&format!(
            "{} [{}] ({})",
            entry.detail_line(),
            entry.outcome.code,
            entry.repo.path().display()
        ))
    }

    pub fn finish(&self, report: &FinalReport) -> anyhow::Result<()> {
        self.append(&format!(
            "reposync run finished {}: {} repositories; {}",
            report.finished_at(),
            report.total(),
            report.tally().compact_line(report.total())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(code: OutcomeCode) -> RepoOutcome {
        RepoOutcome::new(code)
    }

    fn report_of(entries: &[(&str, OutcomeCode)]) -> FinalReport {
        let mut report = RunReport::new(OffsetDateTime::UNIX_EPOCH);
        for (path, code) in entries {
            report.record(RepositoryRef::new(*path), outcome(*code));
        }
        report.finalize(OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn tally_counts_each_category() {
        let mut report = RunReport::new(OffsetDateTime::UNIX_EPOCH);
        report.record(RepositoryRef::new("/r/a"), outcome(OutcomeCode::Pushed));
        report.record(
            RepositoryRef::new("/r/b"),
            RepoOutcome {
                code: OutcomeCode::Pushed,
                remote_created: true,
            },
        );
        report.record(RepositoryRef::new("/r/c"), outcome(OutcomeCode::NoChangeRemoteAbsent));
        report.record(RepositoryRef::new("/r/d"), outcome(OutcomeCode::PushFailed));
        report.record(RepositoryRef::new("/r/e"), outcome(OutcomeCode::DetachedHead));
        let report = report.finalize(OffsetDateTime::UNIX_EPOCH);

        let tally = report.tally();
        assert_eq!(report.total(), 5);
        assert_eq!(tally.pushed, 2);
        assert_eq!(tally.created, 1);
        assert_eq!(tally.remote_missing, 1);
        assert_eq!(tally.errors(), 2);
        assert_eq!(
            tally.compact_line(report.total()),
            "pushed 2/5, errors 2/5, remote-missing 1/5, created 1/5"
        );
    }

    #[test]
    fn short_detail_is_sent_verbatim() {
        let report = report_of(&[
            ("/r/notes", OutcomeCode::Pushed),
            ("/r/site", OutcomeCode::NoChangeRemotePresent),
        ]);
        let summary = report.summary(CHANNEL_LIMIT);
        assert_eq!(summary, SummaryText::Detail("notes: pushed\nsite: no change".to_string()));
    }

    #[test]
    fn limit_boundary_is_inclusive() {
        let report = report_of(&[("/r/a", OutcomeCode::Pushed)]);
        let tally = *report.tally();
        let at_limit = "x".repeat(CHANNEL_LIMIT);
        let over_limit = "x".repeat(CHANNEL_LIMIT + 1);

        let kept = SummaryText::Detail(at_limit.clone()).fit(CHANNEL_LIMIT, &tally, 1);
        assert_eq!(kept, SummaryText::Detail(at_limit));
        let compacted = SummaryText::Detail(over_limit).fit(CHANNEL_LIMIT, &tally, 1);
        assert_eq!(compacted, SummaryText::Compacted("pushed 1/1".to_string()));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let report = report_of(&[("/r/a", OutcomeCode::Pushed)]);
        let text = "é".repeat(CHANNEL_LIMIT);
        let summary = SummaryText::Detail(text.clone()).fit(CHANNEL_LIMIT, report.tally(), 1);
        assert_eq!(summary, SummaryText::Detail(text));
    }

    #[test]
    fn oversized_fleet_report_compacts_in_field_order() {
        let mut entries = Vec::new();
        let codes = [
            (OutcomeCode::Pushed, 5),
            (OutcomeCode::NoChangeRemotePresent, 4),
            (OutcomeCode::LocalCommitOnly, 2),
            (OutcomeCode::RebaseConflict, 1),
        ];
        for (code, count) in codes {
            for idx in 0..count {
                entries.push((format!("/home/dev/src/project-{}-{idx}", code.as_str()), code));
            }
        }
        let borrowed: Vec<(&str, OutcomeCode)> =
            entries.iter().map(|(path, code)| (path.as_str(), *code)).collect();
        let report = report_of(&borrowed);
        assert!(report.detail_text().chars().count() > CHANNEL_LIMIT);

        let summary = report.summary(CHANNEL_LIMIT);
        assert_eq!(
            summary.as_str(),
            "pushed 5/12, no-change 4/12, local 2/12, conflict 1/12"
        );
        assert!(summary.is_compacted());
    }

    #[test]
    fn compacting_twice_is_identity() {
        let report = report_of(&[
            ("/r/a", OutcomeCode::Pushed),
            ("/r/b", OutcomeCode::RebaseConflict),
        ]);
        let once = report.summary(10);
        let twice = once.clone().compact(report.tally(), report.total());
        assert!(once.is_compacted());
        assert_eq!(once, twice);
    }

    #[test]
    fn detail_log_records_checkpoints_and_footer() {
        let tmp = TempDir::new().unwrap();
        let log = DetailLog::create(tmp.path(), OffsetDateTime::UNIX_EPOCH).unwrap();
        assert!(log.path().ends_with("reposync-19700101-000000.log"));

        let mut report = RunReport::new(OffsetDateTime::UNIX_EPOCH);
        let entry = report.record(RepositoryRef::new("/r/notes"), outcome(OutcomeCode::Pushed));
        log.checkpoint(entry).unwrap();
        let report = report.finalize(OffsetDateTime::UNIX_EPOCH);
        log.finish(&report).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "notes: pushed [PUSHED] (/r/notes)");
        assert!(lines[2].ends_with("1 repositories; pushed 1/1"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(log.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
