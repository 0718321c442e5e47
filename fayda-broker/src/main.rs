//! Fayda Relay Broker

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fayda_broker::{
    routes, AppState, ChromiumDriver, Config, ConsoleEmailSender, EmailSender, InMemoryRegistry,
    ReqwestTransport, SmtpConfig, SmtpEmailSender,
};

fn email_sender() -> Box<dyn EmailSender> {
    match SmtpConfig::from_env() {
        Some(smtp) => match SmtpEmailSender::new(smtp) {
            Ok(sender) => return Box::new(sender),
            Err(e) => tracing::warn!(error = %e, "SMTP unavailable, falling back to console email"),
        },
        None => tracing::info!("SMTP not configured, using console email"),
    }
    Box::new(ConsoleEmailSender::new())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fayda_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    let layout = config.extraction_layout()?;
    tracing::info!(layout = %layout.version, "Loaded extraction layout");

    let driver = ChromiumDriver::new(config.portal.clone(), layout);
    let transport = ReqwestTransport::new(config.delivery.request_timeout)?;

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        driver,
        InMemoryRegistry::new(),
        email_sender(),
        Arc::new(transport),
    ));
    state.sessions.spawn_sweeper();

    // Create router
    let app = routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sessions.shutdown().await;

    Ok(())
}
