//! Standalone mini-oidc provider.
//!
//! Reads `application.yaml` (plus profile overrides and environment
//! variables) from the working directory, registers the configured clients
//! and users, and serves discovery, JWKS, authorize and token endpoints.

mod settings;

use clap::Parser;
use mini_oidc_core::OidcConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use settings::{build_provider, ServerSettings};

#[derive(Parser, Debug)]
#[command(name = "mini-oidc-server", version, about = "Minimal OpenID Connect provider")]
struct Cli {
    /// Configuration profile (overridden by MINI_OIDC_PROFILE).
    #[arg(long, default_value = "dev")]
    profile: String,

    /// Listen address, overrides `server.bind`.
    #[arg(long)]
    bind: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mini_oidc=debug")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = OidcConfig::load(&cli.profile)?;
    let mut settings = ServerSettings::from_config(&config)?;
    if let Some(bind) = cli.bind {
        settings.bind = bind;
    }

    let provider = build_provider(&config, &settings)?;
    let cancel = CancellationToken::new();
    let sweeper = provider.spawn_sweeper(cancel.clone());

    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        profile = config.profile(),
        issuer = %provider.config().issuer,
        "Listening"
    );

    let shutdown = cancel.clone();
    axum::serve(listener, provider.router())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    sweeper.await?;
    info!("Server stopped");
    Ok(())
}
