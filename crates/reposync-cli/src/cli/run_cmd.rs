use super::*;
use reposync_core::dispatch::{DispatchReport, Dispatcher, OutboundMessage};
use reposync_core::lockfile::{RunLock, holder_pid};
use reposync_core::provider::ConnectivityProbe;
use reposync_core::remote::RemoteResolver;
use reposync_core::report::{DetailLog, FinalReport, ReportEntry};
use reposync_core::sync_engine::{Synchronizer, run_fleet};
use reposync_providers::{
    FixedProbe, GitCliTransport, GitHubHosting, NetworkProbe, ScpTransfer, SendmailMessenger,
};
use serde_json::json;
use time::OffsetDateTime;

pub(super) async fn handle_run(
    args: RunArgs,
    config_path: &Path,
    audit: &AuditLogger,
) -> anyhow::Result<()> {
    let Startup {
        config,
        credentials,
        token,
    } = load_startup(config_path)?;

    let lock_path = default_lock_path()?;
    let Some(_lock) = RunLock::try_acquire(&lock_path)? else {
        info!(
            lock = %lock_path.display(),
            holder = ?holder_pid(&lock_path),
            "another run holds the gate; skipped"
        );
        audit.record(AuditRecord::new(audit::RUN_SKIPPED, AuditStatus::Skipped))?;
        println!("skipped: another run is in progress");
        return Ok(());
    };

    if args.prune_candidates {
        let dropped = discovery::prune_candidate_list(&config.candidates)?;
        info!(dropped, list = %config.candidates.display(), "pruned candidate list");
    }
    let repos = discovery::discover(&config.candidates)?;

    let started_at = OffsetDateTime::now_utc();
    audit.record(AuditRecord::new(audit::RUN_START, AuditStatus::Ok).details(json!({
        "repos": repos.len(),
        "force_offline": args.force_offline,
    })))?;
    info!(repos = repos.len(), "run started");

    let detail_log = DetailLog::create(&config.log_dir()?, started_at)?;
    let timeout = config.timeout();
    let probe: Box<dyn ConnectivityProbe> = if args.force_offline {
        Box::new(FixedProbe(false))
    } else {
        Box::new(NetworkProbe::new(
            config.connectivity.require_wireless,
            config.connectivity.probe_address.clone(),
            timeout,
        ))
    };
    let hosting = GitHubHosting::new(&config.hosting.api_url, token, timeout)?;
    let transport = GitCliTransport::new(timeout);
    let target = config.hosting_target();
    let resolver = RemoteResolver::new(&hosting, &transport, &target);
    let synchronizer = Synchronizer::new(
        probe.as_ref(),
        resolver,
        &transport,
        config.sync_policy(&credentials),
    );

    let checkpoint = |entry: &ReportEntry| {
        if let Err(err) = detail_log.checkpoint(entry) {
            warn!(repo = %entry.repo.name(), error = %err, "could not append detail log");
        }
        let status = if is_error(entry) {
            AuditStatus::Failed
        } else {
            AuditStatus::Ok
        };
        let _ = audit.record(
            AuditRecord::new(audit::REPO_OUTCOME, status)
                .repo(&entry.repo)
                .outcome(entry.outcome.code)
                .details(json!({ "remote_created": entry.outcome.remote_created })),
        );
    };
    let report = run_fleet(&synchronizer, repos, started_at, &checkpoint)
        .await
        .finalize(OffsetDateTime::now_utc());
    seal_detail_log(&detail_log, &report);

    let summary = report.summary(config.channel_limit);
    let message = OutboundMessage::from_summary(
        &credentials.sms_gateway,
        &credentials.contact_email,
        subject_line(report.started_at()),
        &summary,
    );

    if args.dry_run_notify {
        print!("{}", message.render());
        println!("detail log kept at {}", detail_log.path().display());
    } else {
        let messenger = SendmailMessenger::new(config.mail_command.clone(), timeout);
        let bulk = ScpTransfer::new(
            credentials.ssh_host.clone(),
            config.remote_log_dir.clone(),
            timeout,
        );
        let delivery = Dispatcher::new(&messenger, &bulk)
            .dispatch(&message, detail_log.path())
            .await;
        record_delivery(audit, &delivery, summary.is_compacted());
    }

    record_finish(audit, &report);
    print_outcome(&report);
    Ok(())
}

fn is_error(entry: &ReportEntry) -> bool {
    use reposync_core::model::OutcomeCode::*;
    matches!(
        entry.outcome.code,
        InvalidRepo
            | NoCommitsInitFailed
            | DetachedHead
            | CommitFailed
            | RebaseConflict
            | PushFailed
            | RemoteCreateFailed
    )
}

pub(super) fn subject_line(started_at: OffsetDateTime) -> String {
    let stamp = time::format_description::parse("[year]-[month]-[day] [hour]:[minute]")
        .ok()
        .and_then(|format| started_at.format(&format).ok())
        .unwrap_or_else(|| started_at.unix_timestamp().to_string());
    format!("reposync {stamp}")
}

fn record_delivery(audit: &AuditLogger, delivery: &DispatchReport, compacted: bool) {
    let message_status = if delivery.message_sent {
        AuditStatus::Ok
    } else {
        AuditStatus::Failed
    };
    let _ = audit.record(
        AuditRecord::new(audit::NOTIFY_MESSAGE, message_status)
            .details(json!({ "compacted": compacted })),
    );
    let bulk_status = if delivery.log_delivered {
        AuditStatus::Ok
    } else {
        AuditStatus::Failed
    };
    let _ = audit.record(
        AuditRecord::new(audit::NOTIFY_BULK, bulk_status)
            .details(json!({ "purged": delivery.log_purged })),
    );
}

/// Past this point the run has completed; write failures are logged only.
pub(super) fn seal_detail_log(detail_log: &DetailLog, report: &FinalReport) {
    if let Err(err) = detail_log.finish(report) {
        warn!(path = %detail_log.path().display(), error = %err, "could not finish detail log");
    }
}

pub(super) fn record_finish(audit: &AuditLogger, report: &FinalReport) {
    let record = AuditRecord::new(audit::RUN_FINISH, AuditStatus::Ok)
        .details(json!({ "total": report.total(), "tally": report.tally() }));
    if let Err(err) = audit.record(record) {
        warn!(error = %err, "could not record run finish");
    }
}

fn print_outcome(report: &FinalReport) {
    for entry in report.entries() {
        println!("{}", entry.detail_line());
    }
    println!("{}", report.tally().compact_line(report.total()));
}
