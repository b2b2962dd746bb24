//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use dispatcher::{encode_frame, is_personal, render, RenderContext};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    rotation: RotationInfo,
    host: HostInfo,
    templates: Vec<TemplateInfo>,
}

#[derive(Serialize)]
struct RotationInfo {
    update_interval_ms: u64,
    send_batch_size: usize,
    batch_delay_ms: u64,
    personalize_on_connect_only: bool,
    debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<usize>,
}

#[derive(Serialize)]
struct HostInfo {
    listen: String,
    max_players: u32,
    connect_settle_delay_ms: u64,
    outbound_queue: usize,
}

#[derive(Serialize)]
struct TemplateInfo {
    index: usize,
    template: String,
    /// Shared (non-personalized) rendering with nobody online
    preview: String,
    frame_bytes: usize,
    personal: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &ServiceConfig) -> ConfigInfo {
    let brand = &config.brand;
    let ctx = RenderContext {
        online: 0,
        max_players: config.host.max_players,
    };

    let templates = brand
        .messages
        .iter()
        .enumerate()
        .map(|(index, template)| {
            let preview = render(template, &ctx, None);
            TemplateInfo {
                index,
                template: template.clone(),
                frame_bytes: encode_frame(&preview).len(),
                preview,
                personal: is_personal(template),
            }
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        rotation: RotationInfo {
            update_interval_ms: brand.update_interval_ms,
            send_batch_size: brand.send_batch_size,
            batch_delay_ms: brand.batch_delay_ms,
            personalize_on_connect_only: brand.personalize_on_connect_only,
            debug: brand.debug,
            cache_capacity: brand.cache_capacity,
        },
        host: HostInfo {
            listen: config.host.listen.clone(),
            max_players: config.host.max_players,
            connect_settle_delay_ms: config.host.connect_settle_delay_ms,
            outbound_queue: config.host.outbound_queue,
        },
        templates,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 brandcast Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Version: {}\n", info.version);

    let rotation = &info.rotation;
    println!("Rotation:");
    println!("  Interval: {} ms", rotation.update_interval_ms);
    println!(
        "  Batches: {} recipient(s) every {} ms",
        rotation.send_batch_size, rotation.batch_delay_ms
    );
    println!(
        "  Personalize on connect only: {}",
        rotation.personalize_on_connect_only
    );
    match rotation.cache_capacity {
        Some(capacity) => println!("  Cache: up to {} frame(s)", capacity),
        None => println!("  Cache: unbounded"),
    }
    println!("  Debug logging: {}", rotation.debug);

    let host = &info.host;
    println!("\nHost:");
    println!("  Listen: {}", host.listen);
    println!("  Max players: {}", host.max_players);
    println!("  Connect settle delay: {} ms", host.connect_settle_delay_ms);
    println!("  Outbound queue: {} frame(s)", host.outbound_queue);

    println!("\nTemplates ({}):", info.templates.len());
    for template in &info.templates {
        let marker = if template.personal { " [personal]" } else { "" };
        println!(
            "  [{}] {} ({} bytes){}",
            template.index, template.preview, template.frame_bytes, marker
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_previews() {
        let mut config = ServiceConfig::default();
        config.brand.messages = vec![
            "DeepCraft".to_string(),
            "{online}/{max_players} - {player}".to_string(),
        ];

        let info = build_config_info(&config);
        assert_eq!(info.templates.len(), 2);
        assert_eq!(info.templates[0].frame_bytes, 10);
        assert!(!info.templates[0].personal);
        assert_eq!(info.templates[1].preview, "0/500 - {player}");
        assert!(info.templates[1].personal);
    }
}
