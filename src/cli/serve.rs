//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{LogFormat, LoggingConfig, PulseConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<PulseConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        PulseConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        PulseConfig::default()
    };

    config = config.with_env_overrides();

    // CLI flags win over file and environment
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel `cancel_token`.
pub(crate) async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting Pulse hub");
    tracing::debug!(?config, "Loaded configuration");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(Arc::new(config)));
    let app = create_router(Arc::clone(&state));

    let sources = state.scheduler.kinds();
    if sources.is_empty() {
        tracing::warn!("No telemetry sources configured; only relaying client traffic");
    } else {
        tracing::info!(?sources, "Starting telemetry scheduler");
    }

    let cancel_token = CancellationToken::new();
    let scheduler_handle = Arc::clone(&state.scheduler).start(cancel_token.clone());
    let sweeper_handle = Arc::clone(&state.manager).start_sweeper(cancel_token.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Pulse hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // serve can also return on a listener error; stop the background tasks either way
    cancel_token.cancel();

    tracing::info!("Waiting for telemetry scheduler to stop");
    scheduler_handle.await?;
    tracing::info!("Waiting for liveness sweeper to stop");
    sweeper_handle.await?;

    tracing::info!("Pulse hub stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn args(config: PathBuf) -> ServeArgs {
        ServeArgs {
            config,
            port: None,
            host: None,
            log_level: None,
        }
    }

    #[test]
    fn test_serve_config_loading() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 9200").unwrap();

        let config = load_config_with_overrides(&args(temp.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 9200);
    }

    #[test]
    fn test_serve_cli_overrides_config() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 9200").unwrap();

        let mut args = args(temp.path().to_path_buf());
        args.port = Some(9300);
        args.log_level = Some("debug".to_string());

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 9300);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_serve_works_without_config_file() {
        let config = load_config_with_overrides(&args(PathBuf::from("nonexistent.toml"))).unwrap();
        assert_eq!(config.server.port, 8600);
        assert!(config.telemetry.sources.is_empty());
    }

    #[test]
    fn test_serve_rejects_unparseable_file() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nport = ").unwrap();

        assert!(load_config_with_overrides(&args(temp.path().to_path_buf())).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_signal_returns_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(cancel))
            .await
            .expect("shutdown_signal should return once cancelled");
    }

    #[tokio::test]
    async fn test_background_tasks_stop_on_shutdown() {
        let state = Arc::new(AppState::new(Arc::new(PulseConfig::default())));
        let cancel = CancellationToken::new();

        let scheduler = Arc::clone(&state.scheduler).start(cancel.clone());
        let sweeper = Arc::clone(&state.manager).start_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), async {
            scheduler.await.unwrap();
            sweeper.await.unwrap();
        })
        .await;
        assert!(result.is_ok());
    }
}
