//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use dispatcher::is_personal;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    template_count: usize,
    update_interval_ms: u64,
    send_batch_size: usize,
    batch_delay_ms: u64,
    personalize_on_connect_only: bool,
    listen: String,
    max_players: u32,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_with_report(&args.config) {
        Ok((config, adjustments)) => {
            let mut warnings: Vec<String> = adjustments.iter().map(|a| a.to_string()).collect();
            warnings.extend(collect_warnings(&config));

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    template_count: config.brand.messages.len(),
                    update_interval_ms: config.brand.update_interval_ms,
                    send_batch_size: config.brand.send_batch_size,
                    batch_delay_ms: config.brand.batch_delay_ms,
                    personalize_on_connect_only: config.brand.personalize_on_connect_only,
                    listen: config.host.listen.clone(),
                    max_players: config.host.max_players,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let brand = &config.brand;
    let mut warnings = Vec::new();

    if brand.messages.len() < 2 {
        warnings.push("Only one message configured - rotation stays idle".to_string());
    }

    if brand.personalize_on_connect_only {
        for (index, message) in brand.messages.iter().enumerate() {
            if is_personal(message) {
                warnings.push(format!(
                    "brand.messages[{index}] uses {{player}}/{{server}}, which rotation \
                     broadcasts leave unreplaced while personalize_on_connect_only is set"
                ));
            }
        }
    }

    if brand.cache_capacity.is_none() {
        warnings.push("brand.cache_capacity is unbounded".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Templates: {}", summary.template_count);
            println!("  Rotation: every {} ms", summary.update_interval_ms);
            println!(
                "  Batches: {} recipient(s) every {} ms",
                summary.send_batch_size, summary.batch_delay_ms
            );
            println!(
                "  Personalize on connect only: {}",
                summary.personalize_on_connect_only
            );
            println!("  Listen: {} (max players {})", summary.listen, summary.max_players);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
