use clap::Parser;
use sqlx::migrate::Migrator;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vsla_core::adapters::PostgresLedgerRepository;
use vsla_core::cli::{self, Cli, Commands, DbCommands};
use vsla_core::{config, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config).await?;

    if let Commands::Db(DbCommands::Migrate) = args.command {
        let migrator = Migrator::new(Path::new("./migrations")).await?;
        migrator.run(&pool).await?;
        tracing::info!("database migrations completed");
        return Ok(());
    }

    let repo = Arc::new(PostgresLedgerRepository::new(pool));
    cli::run(args.command, repo).await
}
