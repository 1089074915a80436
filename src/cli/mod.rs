use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::app::{router, AppState};
use crate::auth::Authenticator;
use crate::config::{AppConfig, Environment};
use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "profile-service")]
#[command(about = "Per-user profile and address service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Listen on this port instead of the configured one")]
        port: Option<u16>,
    },

    #[command(about = "Mint a bearer token for a subject using the configured secret")]
    Token {
        #[arg(help = "Subject id to embed in the token")]
        subject: Uuid,

        #[arg(long, help = "Token lifetime in hours (defaults to TOKEN_TTL_HOURS)")]
        hours: Option<u64>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::config::config().clone();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Token { subject, hours } => token(&config, subject, hours),
    }
}

async fn serve(config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Starting profile-service in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("AUTH_SECRET must be set in {:?} mode", config.environment);
    }
    if config.environment == Environment::Production && !config.rate_limit.enabled {
        tracing::warn!("Rate limiting is disabled in production");
    }

    let stores = DatabaseManager::connect(&config.database)
        .await
        .context("failed to initialise the resource store")?;

    let state = AppState::new(&config, stores);
    let _janitor = state.admission.spawn_janitor();
    let app = router(state);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.server.port)));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("profile-service listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("profile-service stopped");
    Ok(())
}

fn token(config: &AppConfig, subject: Uuid, hours: Option<u64>) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("AUTH_SECRET is not set");
    }

    let hours = hours.unwrap_or(config.security.token_ttl_hours);
    let ttl = chrono::Duration::hours(i64::try_from(hours).context("token lifetime too large")?);
    let token = Authenticator::new(&config.security.jwt_secret).issue(subject, ttl)?;

    println!("{}", token);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["profile-service"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn token_takes_a_subject_and_lifetime() {
        let subject = Uuid::new_v4();
        let id = subject.to_string();
        let cli = Cli::try_parse_from(["profile-service", "token", id.as_str(), "--hours", "2"]).unwrap();
        match cli.command {
            Some(Commands::Token { subject: parsed, hours }) => {
                assert_eq!(parsed, subject);
                assert_eq!(hours, Some(2));
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn rejects_malformed_subjects() {
        assert!(Cli::try_parse_from(["profile-service", "token", "not-a-uuid"]).is_err());
    }
}
