//! BrandService - owns the live dispatcher and swaps it on reload

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{HostConfig, RecipientRegistry, Scheduler, ServiceConfig, SharedRecipient};
use dispatcher::{create_dispatcher, Dispatcher};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::registry::ConnectionRegistry;
use crate::error::{CliError, Result};

/// Point-in-time service status (console `status`)
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub index: usize,
    pub template: String,
    pub templates: usize,
    pub rotation_active: bool,
    pub pump_running: bool,
    pub queue_len: usize,
    pub online: usize,
    pub capacity: u32,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub skipped_inactive: u64,
    pub rotations: u64,
    pub drain_ticks: u64,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Result of a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub templates: usize,
    pub queued: usize,
}

/// Host-side owner of the dispatcher
pub struct BrandService {
    config_path: PathBuf,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<ConnectionRegistry>,
    host: RwLock<HostConfig>,
    dispatcher: RwLock<Arc<Dispatcher>>,
}

impl BrandService {
    /// Build the first dispatcher from `config`
    pub fn start(
        config: ServiceConfig,
        config_path: impl Into<PathBuf>,
        scheduler: Arc<dyn Scheduler>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        registry.set_capacity(config.host.max_players);
        let dispatcher = Self::build(&config, &scheduler, &registry);

        Self {
            config_path: config_path.into(),
            scheduler,
            registry,
            host: RwLock::new(config.host),
            dispatcher: RwLock::new(dispatcher),
        }
    }

    fn build(
        config: &ServiceConfig,
        scheduler: &Arc<dyn Scheduler>,
        registry: &Arc<ConnectionRegistry>,
    ) -> Arc<Dispatcher> {
        let registry: Arc<dyn RecipientRegistry> = registry.clone();
        Arc::new(create_dispatcher(&config.brand, Arc::clone(scheduler), registry))
    }

    /// The dispatcher currently in service
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher.read())
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn host(&self) -> HostConfig {
        self.host.read().clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Greet `recipient` after the settle delay
    ///
    /// Uses whichever dispatcher is current when the delay expires.
    pub fn on_connect(self: &Arc<Self>, recipient: SharedRecipient) {
        let delay = self.host.read().connect_settle_delay();
        let service = Arc::clone(self);
        self.scheduler.run_once(
            delay,
            Box::new(move || {
                let outcome = service.dispatcher().send_immediate(recipient.as_ref());
                debug!(
                    client = %recipient.display_name(),
                    outcome = ?outcome,
                    "Connect greeting"
                );
            }),
        );
    }

    /// Re-read the config file and replace the dispatcher
    ///
    /// On a load failure the running dispatcher is kept.
    #[instrument(name = "service_reload", skip(self), fields(path = %self.config_path.display()))]
    pub fn reload(&self) -> Result<ReloadReport> {
        let config = config_loader::ConfigLoader::load_from_path(&self.config_path)
            .map_err(|e| CliError::config_load(self.config_path.display().to_string(), e))?;

        {
            let host = self.host.read();
            if host.listen != config.host.listen {
                warn!(
                    current = %host.listen,
                    configured = %config.host.listen,
                    "Listen address changes need a restart"
                );
            }
        }

        let mut slot = self.dispatcher.write();
        slot.stop();
        self.registry.set_capacity(config.host.max_players);
        *self.host.write() = config.host.clone();
        let fresh = Self::build(&config, &self.scheduler, &self.registry);
        *slot = Arc::clone(&fresh);
        drop(slot);

        let queued = fresh.broadcast_current();
        let report = ReloadReport {
            templates: fresh.templates().len(),
            queued,
        };
        info!(templates = report.templates, queued, "Configuration reloaded");
        Ok(report)
    }

    pub fn status(&self) -> ServiceStatus {
        let dispatcher = self.dispatcher();
        let metrics = dispatcher.metrics();
        ServiceStatus {
            index: dispatcher.current_index(),
            template: dispatcher.current_template().to_string(),
            templates: dispatcher.templates().len(),
            rotation_active: dispatcher.is_rotation_active(),
            pump_running: dispatcher.is_pump_running(),
            queue_len: metrics.queue_len,
            online: self.registry.online_count(),
            capacity: self.registry.capacity(),
            frames_sent: metrics.sent,
            send_failures: metrics.failures,
            skipped_inactive: metrics.skipped_inactive,
            rotations: metrics.rotations,
            drain_ticks: metrics.drain_ticks,
            cache_entries: metrics.cache_entries,
            cache_hits: metrics.cache_hits,
            cache_misses: metrics.cache_misses,
        }
    }

    /// Stop the dispatcher and close every connection
    #[instrument(name = "service_shutdown", skip(self))]
    pub fn shutdown(&self) {
        self.dispatcher.read().stop();
        let closed = self.registry.close_all();
        info!(closed, "Service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::connection::{ClientConnection, Handshake};
    use config_loader::ConfigLoader;
    use dispatcher::{decode_frame, ManualScheduler};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn config(messages: &[&str]) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.brand.messages = messages.iter().map(|m| m.to_string()).collect();
        config.host.connect_settle_delay_ms = 100;
        config
    }

    #[tokio::test]
    async fn test_on_connect_waits_for_settle_delay() {
        let scheduler = Arc::new(ManualScheduler::new());
        let registry = Arc::new(ConnectionRegistry::new(500));
        let service = Arc::new(BrandService::start(
            config(&["Hi {player} @ {server}"]),
            "unused.toml",
            scheduler.clone(),
            registry.clone(),
        ));

        let (writer, mut reader) = tokio::io::duplex(256);
        let handshake = Handshake {
            name: "Steve".into(),
            placement: Some("lobby".into()),
        };
        let (connection, worker) = ClientConnection::spawn(registry.next_id(), handshake, writer, 4);
        registry.insert(connection.clone());

        service.on_connect(connection.clone());
        scheduler.advance(Duration::from_millis(99));
        assert_eq!(service.status().frames_sent, 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(service.status().frames_sent, 1);

        registry.close_all();
        drop(connection);
        worker.await.unwrap();

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(decode_frame(&buf).unwrap().0, "Hi Steve @ lobby");
    }

    #[tokio::test]
    async fn test_reload_swaps_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brandcast.toml");
        ConfigLoader::save(&config(&["old"]), &path).unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let registry = Arc::new(ConnectionRegistry::new(500));
        let service = BrandService::start(
            ConfigLoader::load_from_path(&path).unwrap(),
            &path,
            scheduler,
            registry,
        );
        let before = service.dispatcher();
        assert_eq!(before.current_template(), "old");

        let mut updated = config(&["new", "newer"]);
        updated.host.max_players = 42;
        ConfigLoader::save(&updated, &path).unwrap();

        let report = service.reload().unwrap();
        assert_eq!(report, ReloadReport { templates: 2, queued: 0 });
        assert!(before.is_stopped());
        assert_eq!(service.dispatcher().current_template(), "new");
        assert!(service.status().rotation_active);
        assert_eq!(service.status().capacity, 42);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_running_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brandcast.toml");
        ConfigLoader::save(&config(&["keep"]), &path).unwrap();

        let service = BrandService::start(
            config(&["keep"]),
            &path,
            Arc::new(ManualScheduler::new()),
            Arc::new(ConnectionRegistry::new(500)),
        );
        std::fs::write(&path, "[brand\nbroken").unwrap();

        assert!(matches!(service.reload(), Err(CliError::ConfigLoad { .. })));
        assert!(!service.dispatcher().is_stopped());
        assert_eq!(service.status().template, "keep");
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let scheduler = Arc::new(ManualScheduler::new());
        let service = BrandService::start(
            config(&["A", "B"]),
            "unused.toml",
            scheduler.clone(),
            Arc::new(ConnectionRegistry::new(500)),
        );
        assert_eq!(scheduler.live_tasks(), 1);
        service.shutdown();
        assert_eq!(scheduler.live_tasks(), 0);
        assert!(service.dispatcher().is_stopped());
    }
}
