use std::env;

use clap::{Parser, Subcommand};
use kindred_core::Counter;
use kindred_core::events::EventBroadcaster;
use kindred_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use kindred_server::maintenance::CounterMaintenance;
use kindred_server::retention::SweepTarget;
use kindred_server::{AppConfig, AppState, ServerBuilder, observability};

#[derive(Parser)]
#[command(name = "kindred")]
#[command(about = "Notification fan-out, counter maintenance and retention sweeps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (overrides KINDRED_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server, triggers and retention scheduler (default)
    Serve,
    /// Run one retention sweep now
    Sweep {
        /// interests, friendships, chat_batches or processed_events
        collection: String,
    },
    /// Counter maintenance
    Counters {
        #[command(subcommand)]
        command: CounterCommands,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum CounterCommands {
    /// Set a counter to 0 on every user
    Reset {
        /// totalInterestsCount or totalFriendRequestsCount
        counter: String,
        /// Must read "reset <counter>"
        #[arg(long, default_value = "")]
        confirm: String,
    },
    /// Recompute a counter from the records that justify it
    Recount {
        /// totalInterestsCount or totalFriendRequestsCount
        counter: String,
    },
}

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From KINDRED_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (kindred.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (KINDRED_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let cli = Cli::parse();
    let (config_path, source) = resolve_config_path(cli.config.as_deref());

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    observability::apply_logging_level(&cfg.logging.level);

    if let Err(e) = run(cli.command.unwrap_or(Commands::Serve), cfg).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, cfg: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Serve => {
            kindred_server::metrics::init_metrics();
            let server = ServerBuilder::new().with_config(cfg).build()?;
            server.run().await?;
        }
        Commands::Sweep { collection } => {
            let target: SweepTarget = collection.parse()?;
            let state = offline_state(cfg)?;
            let report = state.retention.run(target).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Counters { command } => {
            let state = offline_state(cfg)?;
            let report = match command {
                CounterCommands::Reset { counter, confirm } => {
                    let counter: Counter = counter.parse()?;
                    if confirm.is_empty() {
                        anyhow::bail!(
                            "Refusing to reset without --confirm \"{}\"",
                            CounterMaintenance::confirmation_for(counter)
                        );
                    }
                    state.maintenance.reset(counter, &confirm).await?
                }
                CounterCommands::Recount { counter } => {
                    state.maintenance.recount(counter.parse()?).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config => {
            let mut cfg = cfg;
            if cfg.gateway.access_token.is_some() {
                cfg.gateway.access_token = Some("<redacted>".to_string());
            }
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}

/// State for one-shot commands: no listener, no triggers, no scheduler.
fn offline_state(cfg: AppConfig) -> anyhow::Result<AppState> {
    AppState::from_config(cfg, EventBroadcaster::new_shared())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: KINDRED_CONFIG
/// 3. Default: kindred.toml
fn resolve_config_path(cli: Option<&str>) -> (String, ConfigSource) {
    if let Some(path) = cli {
        return (path.to_string(), ConfigSource::CliArgument);
    }

    if let Ok(path) = env::var("KINDRED_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
