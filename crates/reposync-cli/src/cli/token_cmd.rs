use super::*;

pub(super) fn handle_token(
    args: TokenArgs,
    config_path: &Path,
    audit: &AuditLogger,
) -> anyhow::Result<()> {
    match args.command {
        TokenCommands::Set(args) => handle_set_token(args, config_path, audit),
    }
}

/// Host the token belongs to: the flag, else the configured host, else the default.
pub(super) fn token_host(explicit: Option<String>, config_path: &Path) -> String {
    explicit.unwrap_or_else(|| {
        AppConfig::load(config_path)
            .map(|config| config.hosting.host)
            .unwrap_or_else(|_| "github.com".to_string())
    })
}

pub(super) fn handle_set_token(
    args: SetTokenArgs,
    config_path: &Path,
    audit: &AuditLogger,
) -> anyhow::Result<()> {
    let host = token_host(args.host, config_path);
    let result = auth::store_token(&host, &args.token);
    match &result {
        Ok(()) => {
            println!("Token stored for {host}");
            let audit_id = audit.record(
                AuditRecord::new("token.set", AuditStatus::Ok)
                    .details(serde_json::json!({ "host": host })),
            )?;
            println!("Audit ID: {audit_id}");
        }
        Err(err) => {
            let _ = audit.record(AuditRecord::new("token.set", AuditStatus::Failed).error(err));
        }
    }
    result
}
