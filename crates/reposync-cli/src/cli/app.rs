use super::*;

pub(super) async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let audit = AuditLogger::open(default_audit_dir()?)?;
    info!(command = command_label(&cli.command), "Running command");
    let config_path = resolve_config_path(cli.config.clone())?;

    let result = match cli.command {
        Commands::Run(args) => handle_run(args, &config_path, &audit).await,
        Commands::Check => handle_check(&config_path, &audit),
        Commands::Config(args) => handle_config(args, &config_path, &audit),
        Commands::Token(args) => handle_token(args, &config_path, &audit),
    };

    if let Err(err) = &result {
        if reposync_core::error::is_startup_error(err) {
            warn!(error = %err, "startup check failed");
        }
        let _ = audit.record(
            AuditRecord::new(audit::APP_ERROR, AuditStatus::Failed).error(format!("{err:#}")),
        );
    }
    result
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Run(_) => "run",
        Commands::Check => "check",
        Commands::Config(_) => "config",
        Commands::Token(_) => "token",
    }
}
