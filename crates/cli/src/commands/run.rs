//! `run` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{Scheduler, ServiceConfig};
use dispatcher::TokioScheduler;
use tokio::io::BufReader;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::host::{run_console, BrandService, ConnectionRegistry, Server};

/// Execute the `run` command
pub async fn run_service(args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config);

    // Apply CLI overrides
    if let Some(ref listen) = args.listen {
        info!(listen = %listen, "Overriding listen address from CLI");
        config.host.listen = listen.clone();
    }

    info!(
        templates = config.brand.messages.len(),
        update_interval_ms = config.brand.update_interval_ms,
        send_batch_size = config.brand.send_batch_size,
        batch_delay_ms = config.brand.batch_delay_ms,
        listen = %config.host.listen,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let scheduler: Arc<dyn Scheduler> =
        Arc::new(TokioScheduler::current().context("run requires a tokio runtime")?);
    let registry = Arc::new(ConnectionRegistry::new(config.host.max_players));
    let server = Server::bind(&config.host.listen)
        .await
        .context("Failed to start TCP listener")?;

    let service = Arc::new(BrandService::start(
        config,
        &args.config,
        scheduler,
        registry,
    ));

    let shutdown = Arc::new(Notify::new());
    spawn_reload_on_hangup(Arc::clone(&service));
    if args.console {
        let stdin = BufReader::new(tokio::io::stdin());
        tokio::spawn(run_console(stdin, Arc::clone(&service), Arc::clone(&shutdown)));
    }

    tokio::select! {
        result = server.run(Arc::clone(&service)) => {
            if let Err(e) = result {
                error!(error = %e, "Server stopped");
            }
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping...");
        }
        _ = shutdown.notified() => {
            info!("Stop requested from console");
        }
    }

    service.shutdown();
    info!("brandcast finished");
    Ok(())
}

/// Load or create the config file; fall back to defaults if it is unusable
fn load_config(path: &Path) -> ServiceConfig {
    match config_loader::ConfigLoader::load_or_create(path) {
        Ok(config) => config,
        Err(e) => {
            error!(
                path = %path.display(),
                error = %e,
                "Cannot load config file, using defaults"
            );
            ServiceConfig::default()
        }
    }
}

/// Reload on SIGHUP
#[cfg(unix)]
fn spawn_reload_on_hangup(service: Arc<BrandService>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, reload via signal disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!(path = %service.config_path().display(), "SIGHUP received, reloading");
            if let Err(e) = service.reload() {
                error!(error = %e, "Reload failed, keeping current configuration");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_service: Arc<BrandService>) {}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("brandcast.json");

        let config = load_config(&path);
        assert!(path.exists());
        assert_eq!(config.brand.messages, vec!["DeepCraft".to_string()]);
    }

    #[test]
    fn test_load_config_falls_back_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brandcast.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let config = load_config(&path);
        assert_eq!(config.brand.update_interval_ms, 5000);
    }
}
