use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod cache;
mod config;
mod dashboard;
mod error;
mod goals;
mod llm;
mod meals;
mod nutrition;
mod state;
mod store;

use crate::{
    auth::jwt::JwtKeys,
    config::{JwtConfig, StoreConfig},
    state::AppState,
};

#[derive(Debug, Parser)]
#[command(name = "macrotrack", version, about = "Meal logging and macro tracking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Bring stored rows up to the current schema version.
    Migrate,
    /// Print a session token pair for an email.
    IssueToken {
        #[arg(long)]
        email: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "macrotrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState::init().await?;
            app::serve(app::build_app(state)).await?;
        }
        Command::Migrate => {
            let store_config = StoreConfig::from_env()?;
            let store = state::connect_store(&store_config).await?;
            let report = store
                .migrate_schema()
                .await
                .context("schema migration failed")?;
            tracing::info!(
                migrated = report.migrated,
                skipped = report.skipped,
                "schema migration finished"
            );
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::IssueToken { email } => {
            let jwt = JwtConfig::from_env()?.context("JWT_SECRET must be set to issue tokens")?;
            let pair = auth::services::issue_pair(&JwtKeys::from(&jwt), &email)?;
            println!("{}", serde_json::to_string_pretty(&pair)?);
        }
    }

    Ok(())
}
