//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Normalize out-of-range values back to defaults
//! - Validate configuration legality
//! - Create the default file on first start, save edits back
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_or_create(Path::new("brandcast.toml")).unwrap();
//! println!("Messages: {}", config.brand.messages.len());
//! ```

mod parser;
mod validator;

pub use contracts::ServiceConfig;
pub use parser::ConfigFormat;
pub use validator::Adjustment;

use contracts::ContractError;
use std::path::Path;
use tracing::{info, warn};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Normalization adjustments are logged as warnings.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ServiceConfig, ContractError> {
        let (config, adjustments) = Self::load_with_report(path)?;
        for adjustment in &adjustments {
            warn!(
                path = %path.display(),
                field = adjustment.field,
                "{}",
                adjustment.message
            );
        }
        Ok(config)
    }

    /// Load configuration from file path, returning the normalization report
    ///
    /// # Errors
    /// Same as [`ConfigLoader::load_from_path`].
    pub fn load_with_report(path: &Path) -> Result<(ServiceConfig, Vec<Adjustment>), ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::parse_and_validate(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ServiceConfig, ContractError> {
        Self::parse_and_validate(content, format).map(|(config, _)| config)
    }

    /// Load the file, or write and return the default configuration if it is missing
    ///
    /// # Errors
    /// - Unsupported format
    /// - Directory creation / write failure
    /// - Any [`ConfigLoader::load_from_path`] error for an existing file
    pub fn load_or_create(path: &Path) -> Result<ServiceConfig, ContractError> {
        if path.exists() {
            let config = Self::load_from_path(path)?;
            info!(path = %path.display(), "Loaded config from file");
            return Ok(config);
        }

        let config = ServiceConfig::default();
        Self::save(&config, path)?;
        info!(path = %path.display(), "Created default config file");
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories
    ///
    /// # Errors
    /// - Unsupported format
    /// - Serialization / IO failure
    pub fn save(config: &ServiceConfig, path: &Path) -> Result<(), ContractError> {
        let content = match Self::detect_format(path)? {
            ConfigFormat::Toml => Self::to_toml(config)?,
            ConfigFormat::Json => Self::to_json(config)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Serialize ServiceConfig to TOML string
    pub fn to_toml(config: &ServiceConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ServiceConfig to JSON string
    pub fn to_json(config: &ServiceConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, normalize and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<(ServiceConfig, Vec<Adjustment>), ContractError> {
        let mut config = parser::parse(content, format)?;
        let adjustments = validator::normalize(&mut config);
        validator::validate(&config)?;
        Ok((config, adjustments))
    }
}
