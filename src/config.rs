use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use gemstore_core::repo::ListingSettings;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/gemstore.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_bytes: default_max_file_bytes(),
            max_images: default_max_images(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_max_file_bytes() -> usize {
    5 * 1024 * 1024
}
fn default_max_images() -> usize {
    5
}

/// `[listing]`: default page size and which entity listings paginate.
#[derive(Debug, Deserialize, Clone)]
pub struct ListingConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub paginate: PaginateConfig,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            paginate: PaginateConfig::default(),
        }
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginateConfig {
    #[serde(default)]
    pub gems: bool,
    #[serde(default)]
    pub jewelry: bool,
    #[serde(default = "default_true")]
    pub jewelry_types: bool,
    #[serde(default)]
    pub customizations: bool,
    #[serde(default = "default_true")]
    pub contacts: bool,
    #[serde(default)]
    pub orders: bool,
}

impl Default for PaginateConfig {
    fn default() -> Self {
        Self {
            gems: false,
            jewelry: false,
            jewelry_types: true,
            customizations: false,
            contacts: true,
            orders: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ListingConfig {
    pub fn settings(&self) -> ListingSettings {
        ListingSettings {
            default_limit: self.limit,
            paginate_gems: self.paginate.gems,
            paginate_jewelry: self.paginate.jewelry,
            paginate_jewelry_types: self.paginate.jewelry_types,
            paginate_customizations: self.paginate.customizations,
            paginate_contacts: self.paginate.contacts,
            paginate_orders: self.paginate.orders,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.backend == Backend::Sqlite && config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must be set when backend is 'sqlite'");
    }

    config
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: '{}'", config.server.bind))?;

    if config.uploads.max_file_bytes == 0 {
        anyhow::bail!("uploads.max_file_bytes must be > 0");
    }
    if config.uploads.max_images == 0 {
        anyhow::bail!("uploads.max_images must be >= 1");
    }
    if config.server.body_limit_bytes < config.uploads.max_file_bytes {
        anyhow::bail!("server.body_limit_bytes must be >= uploads.max_file_bytes");
    }

    if config.listing.limit == 0 {
        anyhow::bail!("listing.limit must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.db.backend, Backend::Sqlite);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.uploads.max_images, 5);
        let settings = config.listing.settings();
        assert_eq!(settings, ListingSettings::default());
    }

    #[test]
    fn test_paginate_flags_override() {
        let config = parse(
            r#"
            [db]
            backend = "memory"

            [listing]
            limit = 25
            paginate = { gems = true, contacts = false }
            "#,
        )
        .unwrap();
        let settings = config.listing.settings();
        assert_eq!(config.db.backend, Backend::Memory);
        assert_eq!(settings.default_limit, 25);
        assert!(settings.paginate_gems);
        assert!(!settings.paginate_contacts);
        assert!(settings.paginate_jewelry_types);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse("[listing]\nlimit = 0").is_err());
        assert!(parse("[server]\nbind = \"nowhere\"").is_err());
        assert!(parse("[uploads]\nmax_images = 0").is_err());
        assert!(parse("[db]\nbackend = \"postgres\"").is_err());
        assert!(parse("[server]\nbody_limit_bytes = 10\n[uploads]\nmax_file_bytes = 100").is_err());
    }
}
