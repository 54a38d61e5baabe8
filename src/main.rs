use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storefront_ledger::adapters::PostgresStore;
use storefront_ledger::cli::{self, Cli, Commands, DbCommands, TokenCommands};
use storefront_ledger::config::{self, Config, LogFormat};
use storefront_ledger::{create_app, db, AppState};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let auth_secret = config.auth_token_secret()?;
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PostgresStore::new(pool));
    let app = create_app(AppState::new(store, auth_secret));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(config::log_format_from_env().unwrap_or(LogFormat::Plain));
    let config = Config::from_env()?;

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
        Some(Commands::Token(TokenCommands::Issue { user_id })) => {
            cli::handle_token_issue(&config, user_id)
        }
    }
}
