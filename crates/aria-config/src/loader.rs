use std::path::{Path, PathBuf};
use tracing::{info, warn};

use aria_core::{AriaError, Result};

use crate::schema::AriaConfig;

/// Loads the Aria configuration from disk and the environment.
pub struct ConfigLoader {
    config: AriaConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > ARIA_CONFIG env > ~/.aria/aria.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("ARIA_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aria")
            .join("aria.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                AriaError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            AriaConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(AriaError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse TOML text without touching the environment.
    pub fn parse(raw: &str) -> std::result::Result<AriaConfig, toml::de::Error> {
        toml::from_str::<AriaConfig>(raw)
    }

    pub fn get(&self) -> AriaConfig {
        self.config.clone()
    }

    pub fn config(&self) -> &AriaConfig {
        &self.config
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (ARIA_LLM_MODEL, ARIA_LOG_LEVEL, etc.)
    pub fn apply_env_overrides(mut config: AriaConfig) -> AriaConfig {
        if let Ok(v) = std::env::var("ARIA_LLM_MODEL")
            && !v.is_empty()
        {
            config.agent.model = v;
        }
        if let Ok(v) = std::env::var("ARIA_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("ARIA_AUTOMATION_LISTEN") {
            config.automation.listen = v;
        }
        if let Ok(v) = std::env::var("ARIA_API_LISTEN") {
            config.api.listen = v;
        }
        if let Ok(v) = std::env::var("ARIA_ADB_SERIAL") {
            config.device.serial = Some(v);
        }
        // API key: config file takes priority, env is the fallback.
        if config.services.anthropic_api_key.is_none()
            && let Ok(v) = std::env::var("ANTHROPIC_API_KEY")
        {
            config.services.anthropic_api_key = Some(v);
        }
        config
    }
}
