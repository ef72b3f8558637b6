use std::sync::Arc;

use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    application::{
        detection::{DetectionLoop, DetectionSettings},
        shutdown,
    },
    config::AppConfig,
    infrastructure::kafka::{KafkaAlertEmitter, KafkaEventSource},
};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    info!("Starting fraud detector on {}...", config.kafka.brokers);

    let emitter = Arc::new(KafkaAlertEmitter::new(&config.kafka)?);
    let source = Box::new(KafkaEventSource::new(&config.kafka)?);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        trigger.trigger();
    });

    let detection = DetectionLoop::new(
        source,
        emitter,
        shutdown,
        DetectionSettings::from_config(&config),
    );
    detection.run().await;

    Ok(())
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy()
        }))
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
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
}
