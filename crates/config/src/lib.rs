use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use core_types::{DEFAULT_MAX_CHUNKS, UiLanguage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const API_URL_ENV: &str = "DOCENT_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub schema_version: u32,
    pub language: UiLanguage,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

fn default_include_metadata() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            language: UiLanguage::EnUs,
            api_base_url: default_api_base_url(),
            max_chunks: DEFAULT_MAX_CHUNKS,
            include_metadata: true,
        }
    }
}

impl ClientConfig {
    /// Apply the value of [`API_URL_ENV`]; blank values leave the stored URL alone.
    pub fn with_api_url_override(mut self, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
            info!(url = %value.trim(), "using api base url from environment");
            self.api_base_url = normalize_base_url(&value);
        }
        self
    }

    pub fn api_url(&self) -> Result<Url> {
        parse_base_url(&self.api_base_url)
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = normalize_base_url(raw);
    let url = Url::parse(&normalized)
        .with_context(|| format!("invalid api base url `{normalized}`"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api base url `{normalized}` must use http or https");
    }
    if url.cannot_be_a_base() {
        bail!("api base url `{normalized}` cannot carry a path");
    }
    Ok(url)
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("config.json"),
        }
    }

    pub fn from_default_location() -> Result<Self> {
        let mut dir = dirs::config_dir().context("failed to resolve config_dir")?;
        dir.push("docent");
        Ok(Self::from_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_init(&self) -> Result<ClientConfig> {
        if !self.path.exists() {
            let config = ClientConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut config: ClientConfig =
            serde_json::from_str(&raw).context("failed to parse client config json")?;
        self.migrate(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn migrate(&self, config: &mut ClientConfig) {
        if config.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        warn!(
            from = config.schema_version,
            to = CURRENT_SCHEMA_VERSION,
            "migrating client config schema"
        );

        // v1 stored the base url with a trailing slash and allowed a zero chunk budget.
        config.api_base_url = normalize_base_url(&config.api_base_url);
        if config.max_chunks == 0 {
            config.max_chunks = DEFAULT_MAX_CHUNKS;
        }
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }
}
