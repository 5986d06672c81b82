//! Threadline administration CLI
//!
//! Operator tooling for schema migration, moderator role management, and
//! working the report queue from a shell.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use moderation::{ReportFilter, ReportStatus};
use threadline::{Platform, PlatformConfig};
use tracing_subscriber::EnvFilter;

/// Log targets enabled when `RUST_LOG` is unset
const WORKSPACE_TARGETS: &[&str] =
    &["threadline", "threadline_admin", "storage", "mentions", "moderation", "app_core"];

#[derive(Parser)]
#[command(name = "threadline-admin")]
#[command(about = "Threadline administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(short, long, global = true, env = "THREADLINE_DATABASE_PATH")]
    database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the schema
    Migrate,

    /// Give a user moderator capability
    GrantModerator {
        /// Email of the user
        email: String,
    },

    /// Take moderator capability away from a user
    RevokeModerator {
        /// Email of the user
        email: String,
    },

    /// Work the report queue
    Reports {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// List reports, newest first
    List {
        /// Acting moderator's user ID
        #[arg(short, long)]
        moderator: i64,

        /// Only reports in this status (pending, reviewed, dismissed, removed)
        #[arg(short, long)]
        status: Option<String>,

        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Reports per page
        #[arg(short = 'n', long, default_value = "10")]
        page_size: u32,
    },

    /// Resolve a pending report
    Act {
        /// Acting moderator's user ID
        #[arg(short, long)]
        moderator: i64,

        /// Report ID
        #[arg(short, long)]
        report: i64,

        /// review, dismiss or remove
        #[arg(short, long)]
        action: String,

        /// Moderator notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let default_filter = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = PlatformConfig::from_env()?;
    if let Some(path) = cli.database {
        config = config.database_path(path);
    }

    let platform = Platform::open(config)
        .await
        .context("failed to open database")?;

    let outcome = run(&platform, cli.command).await;
    platform.close().await;
    outcome
}

async fn run(platform: &Platform, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            let version = platform.database().current_version().await?;
            println!("Schema at version {}", version);
        }
        Commands::GrantModerator { email } => set_moderator(platform, &email, true).await?,
        Commands::RevokeModerator { email } => set_moderator(platform, &email, false).await?,
        Commands::Reports { command } => match command {
            ReportCommands::List { moderator, status, page, page_size } => {
                let mut filter = ReportFilter::default().page(page).page_size(page_size);
                if let Some(status) = status {
                    filter = filter.status(status.parse::<ReportStatus>()?);
                }
                let reports = platform.list_reports(moderator, &filter).await?;
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            ReportCommands::Act { moderator, report, action, notes } => {
                let resolved = platform
                    .apply_moderation_action(moderator, report, &action, notes.as_deref())
                    .await?;
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            }
        },
    }
    Ok(())
}

async fn set_moderator(platform: &Platform, email: &str, granted: bool) -> anyhow::Result<()> {
    match platform.set_moderator(email, granted).await? {
        Some(user) => {
            println!("{} ({}) is now {}", user.username, email, user.role);
            Ok(())
        }
        None => bail!("no user with email {}", email),
    }
}
