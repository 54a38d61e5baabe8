use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plain" | "" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'plain' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub auth_token_secret: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            auth_token_secret: env::var("AUTH_TOKEN_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
            log_format: log_format_from_env()?,
        })
    }

    /// Only the server and token issuing sign or verify tokens, so the
    /// secret is checked when they ask for it.
    pub fn auth_token_secret(&self) -> anyhow::Result<&str> {
        self.auth_token_secret
            .as_deref()
            .context("AUTH_TOKEN_SECRET must be set to a non-empty value")
    }
}

/// Read separately so logging can be set up before the rest of the
/// configuration is validated.
pub fn log_format_from_env() -> anyhow::Result<LogFormat> {
    LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("").unwrap(), LogFormat::Plain);
        assert_eq!(LogFormat::parse("plain").unwrap(), LogFormat::Plain);
        assert_eq!(LogFormat::parse(" JSON ").unwrap(), LogFormat::Json);
        assert!(LogFormat::parse("xml").is_err());
    }

    fn config_with_secret(secret: Option<&str>) -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost/shop".to_string(),
            database_max_connections: 5,
            auth_token_secret: secret.map(str::to_string),
            log_format: LogFormat::Plain,
        }
    }

    #[test]
    fn test_auth_token_secret_required_on_demand() {
        let config = config_with_secret(Some("s3cret"));
        assert_eq!(config.auth_token_secret().unwrap(), "s3cret");

        let config = config_with_secret(None);
        let err = config.auth_token_secret().unwrap_err();
        assert!(err.to_string().contains("AUTH_TOKEN_SECRET"));
    }
}
