use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::provider::{Provider, ProviderConfig};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Overrides the provider's chat-completions URL.
    pub base_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::HuggingFace.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn provider(&self) -> Result<Provider> {
        match self.provider.as_deref() {
            None => Ok(Provider::HuggingFace),
            Some(name) => {
                Provider::from_str(name).ok_or_else(|| anyhow!("Unknown provider '{}'", name))
            }
        }
    }

    /// Resolve the active provider, reading API keys from the environment first.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        self.provider_config_with(|name| std::env::var(name).ok())
    }

    pub fn provider_config_with<F>(&self, env: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.provider()?;

        let stored_key = match provider {
            Provider::HuggingFace => self.huggingface_api_key.clone(),
            Provider::OpenAI => self.openai_api_key.clone(),
        };
        let api_key = env(provider.api_key_env())
            .filter(|key| !key.is_empty())
            .or(stored_key);

        let mut config = ProviderConfig::for_provider(provider, api_key);
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        Ok(config)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("redcherry").join("config.json"))
    }
}
