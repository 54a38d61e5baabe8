use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::middleware::sign_user_token;

#[derive(Parser)]
#[command(name = "storefront-ledger")]
#[command(about = "Storefront ledger - order placement and payment settlement", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Bearer token commands
    #[command(subcommand)]
    Token(TokenCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a bearer token for a user
    Issue {
        #[arg(value_name = "USER_ID")]
        user_id: i64,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Log Format: {:?}", config.log_format);
    println!(
        "  Auth Token Secret: {}",
        if config.auth_token_secret.is_some() { "set" } else { "unset" }
    );

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub fn handle_token_issue(config: &Config, user_id: i64) -> anyhow::Result<()> {
    let token = sign_user_token(config.auth_token_secret()?, user_id)
        .map_err(|err| anyhow::anyhow!("Failed to sign token: {:?}", err))?;

    tracing::info!(user_id, "Issued bearer token");
    println!("{}", token);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
