use super::*;

pub(super) fn handle_config(
    args: ConfigArgs,
    config_path: &Path,
    audit: &AuditLogger,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(args, config_path, audit),
        ConfigCommands::Show => handle_show(config_path),
    }
}

pub(super) fn handle_init(
    args: InitArgs,
    config_path: &Path,
    audit: &AuditLogger,
) -> anyhow::Result<()> {
    let result: anyhow::Result<()> = (|| {
        if config_path.exists() && !args.force {
            anyhow::bail!(
                "config already exists at {}; pass --force to overwrite",
                config_path.display()
            );
        }
        let config = AppConfig::new(args.candidates, args.owner);
        config.save(config_path)?;
        println!("Config saved to {}", config_path.display());
        println!(
            "Credentials are read from {}",
            config.credentials_path()?.display()
        );
        Ok(())
    })();

    let status = if result.is_ok() {
        AuditStatus::Ok
    } else {
        AuditStatus::Failed
    };
    let mut record = AuditRecord::new("config.init", status);
    if let Err(err) = &result {
        record = record.error(err);
    }
    let audit_id = audit.record(record)?;
    if result.is_ok() {
        println!("Audit ID: {audit_id}");
    }
    result
}

fn handle_show(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let rendered = serde_json::to_string_pretty(&config).context("render config")?;
    println!("# {}", config_path.display());
    println!("{rendered}");
    Ok(())
}
