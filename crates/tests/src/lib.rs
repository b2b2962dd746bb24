//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置文件 -> ConfigLoader -> Dispatcher 的 e2e 测试（虚拟时钟，无需网络）

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, ServiceConfig};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_default_config_snapshot() {
        let config = ServiceConfig::default();
        assert_eq!(config.brand.messages, vec!["DeepCraft".to_string()]);
        assert_eq!(config.brand.update_interval_ms, 5000);
        assert_eq!(config.brand.send_batch_size, 200);
        assert_eq!(config.brand.batch_delay_ms, 50);
        assert!(config.brand.personalize_on_connect_only);
        assert!(!config.brand.debug);
        assert_eq!(config.host.max_players, 500);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{RecipientRegistry, Scheduler, ServiceConfig};
    use dispatcher::{create_dispatcher, decode_frame, Dispatcher, ManualScheduler, MockRegistry};

    const SCENARIO: &str = r#"
[brand]
messages = ["A {online}", "B"]
update_interval_ms = 1000
send_batch_size = 2
batch_delay_ms = 10
"#;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn build(
        config: &ServiceConfig,
        scheduler: &Arc<ManualScheduler>,
        registry: &Arc<MockRegistry>,
    ) -> Dispatcher {
        let scheduler: Arc<dyn Scheduler> = scheduler.clone();
        let registry: Arc<dyn RecipientRegistry> = registry.clone();
        create_dispatcher(&config.brand, scheduler, registry)
    }

    /// End-to-end test: config file -> ConfigLoader -> Dispatcher -> recipients
    ///
    /// 验证完整的数据流：
    /// 1. 从 TOML 文件加载配置
    /// 2. 轮换任务在一个周期后推进索引
    /// 3. 批量泵按 send_batch_size 分批投递到所有接收者
    #[test]
    fn test_e2e_rotation_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "brandcast.toml", SCENARIO);
        let config = ConfigLoader::load_from_path(&path).unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let (registry, players) = MockRegistry::with_recipients(500, 5);
        let registry = Arc::new(registry);
        let dispatcher = build(&config, &scheduler, &registry);

        assert_eq!(dispatcher.current_index(), 0);
        assert!(dispatcher.is_rotation_active());

        scheduler.advance(Duration::from_millis(1000));
        assert_eq!(dispatcher.current_index(), 1);
        assert_eq!(dispatcher.queue_len(), 5);

        // 5 recipients, 2 per tick
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(dispatcher.queue_len(), 3);
        scheduler.advance(Duration::from_millis(20));
        assert_eq!(dispatcher.queue_len(), 0);
        assert!(!dispatcher.is_pump_running());

        for player in &players {
            assert_eq!(player.messages(), vec!["B".to_string()]);
        }

        // second rotation wraps back to the first template
        scheduler.advance(Duration::from_millis(1000));
        assert_eq!(dispatcher.current_index(), 0);
        scheduler.advance(Duration::from_millis(30));
        for player in &players {
            assert_eq!(player.last_message().as_deref(), Some("A 5"));
        }

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.sent, 10);
        assert_eq!(metrics.rotations, 2);
        assert_eq!(metrics.drain_ticks, 6);
    }

    #[test]
    fn test_e2e_normalized_values_drive_timers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "brandcast.json",
            r#"{"brand": {"messages": [], "update_interval_ms": 5, "send_batch_size": 0}}"#,
        );
        let (config, adjustments) = ConfigLoader::load_with_report(&path).unwrap();
        assert_eq!(adjustments.len(), 3);

        let scheduler = Arc::new(ManualScheduler::new());
        let (registry, players) = MockRegistry::with_recipients(500, 1);
        let registry = Arc::new(registry);
        let dispatcher = build(&config, &scheduler, &registry);

        // a single default template never rotates
        assert_eq!(dispatcher.templates(), ["DeepCraft".to_string()]);
        assert!(!dispatcher.is_rotation_active());

        scheduler.advance(Duration::from_millis(10_000));
        assert_eq!(players[0].received_count(), 0);

        dispatcher.broadcast_current();
        scheduler.advance(Duration::from_millis(50));
        let frame = players[0].received().pop().unwrap();
        assert_eq!(decode_frame(&frame).unwrap().0, "DeepCraft");
    }

    #[test]
    fn test_e2e_connect_greeting_is_personalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "brandcast.toml",
            "[brand]\nmessages = [\"{player} @ {server} ({online}/{max_players})\"]\n\n[host]\nmax_players = 20\n",
        );
        let config = ConfigLoader::load_from_path(&path).unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let registry = Arc::new(MockRegistry::new(config.host.max_players));
        let steve = Arc::new(dispatcher::MockRecipient::with_placement("Steve", "lobby"));
        registry.add(steve.clone());
        let dispatcher = build(&config, &scheduler, &registry);

        dispatcher.send_immediate(steve.as_ref());
        assert_eq!(steve.last_message().as_deref(), Some("Steve @ lobby (1/20)"));

        // broadcasts stay shared while personalize_on_connect_only is set
        dispatcher.broadcast_current();
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(
            steve.last_message().as_deref(),
            Some("{player} @ {server} (1/20)")
        );
    }

    #[test]
    fn test_e2e_reload_replaces_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "brandcast.toml", SCENARIO);
        let config = ConfigLoader::load_from_path(&path).unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let (registry, players) = MockRegistry::with_recipients(500, 3);
        let registry = Arc::new(registry);
        let old = build(&config, &scheduler, &registry);

        scheduler.advance(Duration::from_millis(1000));
        assert_eq!(old.queue_len(), 3);

        // reload: stop the old instance, build from the rewritten file
        std::fs::write(&path, "[brand]\nmessages = [\"C\", \"D\"]\n").unwrap();
        let reloaded = ConfigLoader::load_from_path(&path).unwrap();
        old.stop();
        assert_eq!(old.queue_len(), 0);
        drop(old);

        let new = build(&reloaded, &scheduler, &registry);
        assert_eq!(new.current_index(), 0);
        new.broadcast_current();
        scheduler.advance(Duration::from_millis(100));

        for player in &players {
            assert_eq!(player.messages(), vec!["C".to_string()]);
        }
        // old timers are gone; only the new rotation and nothing else remains
        assert_eq!(scheduler.live_tasks(), 1);
    }

    #[test]
    fn test_e2e_failed_reload_keeps_running_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "brandcast.toml", SCENARIO);
        let config = ConfigLoader::load_from_path(&path).unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let (registry, _players) = MockRegistry::with_recipients(500, 1);
        let registry = Arc::new(registry);
        let dispatcher = build(&config, &scheduler, &registry);

        std::fs::write(&path, "[brand\nmessages = ").unwrap();
        assert!(ConfigLoader::load_from_path(&path).is_err());

        scheduler.advance(Duration::from_millis(1000));
        assert_eq!(dispatcher.current_index(), 1);
    }
}
