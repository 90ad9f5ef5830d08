use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::Role;

/// Application configuration, read from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_reviews_path")]
    pub reviews_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory the local image host writes into
    #[serde(default = "default_media_root")]
    pub root: PathBuf,
    /// Base URL under which `root` is publicly reachable
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// A user known to the service, keyed by its bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub token: String,
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_reviews_path() -> PathBuf {
    PathBuf::from("data/reviews.jsonl")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_public_base_url() -> String {
    "http://localhost:8000/media".to_string()
}

fn default_max_file_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_files() -> usize {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reviews_path: default_reviews_path(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            public_base_url: default_public_base_url(),
            max_file_bytes: default_max_file_bytes(),
            max_files: default_max_files(),
        }
    }
}

impl AppConfig {
    /// Load from `$CONFIG_PATH` (or `config.toml`), falling back to defaults
    /// when the file does not exist. `PORT` overrides the configured port.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got {:?}", port))?;
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Upload body cap: every allowed file at full size, plus multipart overhead
    pub fn upload_body_limit(&self) -> usize {
        self.media.max_file_bytes * self.media.max_files + 64 * 1024
    }
}
