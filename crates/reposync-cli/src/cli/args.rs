use super::*;

#[derive(Parser)]
#[command(author, version, about = "Keep a fleet of local working copies pushed to their hosted remotes")]
pub(super) struct Cli {
    #[arg(short, long, global = true, help = "Log at debug level")]
    pub(super) verbose: bool,
    #[arg(long, global = true, value_name = "PATH", help = "Config file to use")]
    pub(super) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Synchronize every listed working copy and send the report")]
    Run(RunArgs),
    #[command(about = "Run the startup checks only")]
    Check,
    #[command(about = "Manage config")]
    Config(ConfigArgs),
    #[command(about = "Manage the hosting token")]
    Token(TokenArgs),
}

#[derive(Parser)]
pub(super) struct RunArgs {
    #[arg(long, help = "Treat the network as unavailable for the whole run")]
    pub(super) force_offline: bool,
    #[arg(long, help = "Print the summary instead of delivering it")]
    pub(super) dry_run_notify: bool,
    #[arg(long, help = "Drop candidate entries whose paths no longer exist")]
    pub(super) prune_candidates: bool,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Write a default config")]
    Init(InitArgs),
    #[command(about = "Print the effective config")]
    Show,
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long, help = "Candidate list, one working-copy path per line")]
    pub(super) candidates: PathBuf,
    #[arg(long, help = "Account that owns the hosted repositories")]
    pub(super) owner: String,
    #[arg(long, help = "Overwrite an existing config")]
    pub(super) force: bool,
}

#[derive(Parser)]
pub(super) struct TokenArgs {
    #[command(subcommand)]
    pub(super) command: TokenCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum TokenCommands {
    #[command(about = "Store a hosting token in the OS keyring")]
    Set(SetTokenArgs),
}

#[derive(Parser)]
pub(super) struct SetTokenArgs {
    #[arg(long)]
    pub(super) token: String,
    #[arg(long, help = "Hosting host; defaults to the configured one")]
    pub(super) host: Option<String>,
}
