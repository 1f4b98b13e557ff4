use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::encoder::EncoderConfig;
use crate::maintenance::{SweeperConfig, TrendingConfig};
use crate::transcript::TranscriptConfig;
use crate::ladder::{default_ladder, QualityTier};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Bitrate ladder. Every upload is encoded into each of these tiers.
    #[serde(default = "default_ladder")]
    pub ladder: Vec<QualityTier>,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Accepted API keys, each bound to the owner it authenticates as.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// An API key and the owner reference uploads made with it are recorded under.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub owner: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelpipe.db")
}

/// Media storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root of the on-disk media tree (hls/, thumbnails/, incoming/, static/).
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Keep the raw upload after ingestion finishes.
    #[serde(default = "default_keep_sources")]
    pub keep_sources: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            keep_sources: default_keep_sources(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_keep_sources() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub encoder: EncoderConfig,
    pub ladder: Vec<QualityTier>,
    pub transcript: TranscriptConfig,
    pub trending: TrendingConfig,
    pub sweeper: SweeperConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_keys_configured: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_keys_configured: config.auth.api_keys.len(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            encoder: config.encoder.clone(),
            ladder: config.ladder.clone(),
            transcript: config.transcript.clone(),
            trending: config.trending.clone(),
            sweeper: config.sweeper.clone(),
        }
    }
}
