#![forbid(unsafe_code)]
use anyhow::Result;
use std::sync::Arc;
use ticket_mailer::{
    api,
    booker::BookingApp,
    config::{self, Config},
    mailer::SmtpMailer,
};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match config::tolerate_missing_env_file(dotenvy::dotenv())? {
        Some(path) => info!("Loaded {}", path.display()),
        None => info!("No .env file found"),
    }

    info!("Starting server");

    let config = Config::from_env()?;
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let port = config.port;

    let app = api::router(BookingApp::new(config, mailer));

    // run our app with hyper, listening globally
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
