use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::ai::{ollama, ClaudeClient, OllamaClient, OpenAIClient, TextGenerator};
use crate::grouping::WeekStart;
use crate::notifications::{NotificationConfiguration, DEFAULT_NOTIFICATION_HOUR};
use crate::provider::Provider;
use crate::starter::ConversationStarterTemplate;

const APP_DIR: &str = "followup";

fn default_notification_hour() -> u32 {
    DEFAULT_NOTIFICATION_HOUR
}

fn default_templates() -> Vec<ConversationStarterTemplate> {
    ConversationStarterTemplate::examples()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default)]
    pub week_start: WeekStart,
    #[serde(default = "default_notification_hour")]
    pub notification_hour: u32,
    #[serde(default = "default_templates")]
    pub templates: Vec<ConversationStarterTemplate>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::OpenAI.as_str().to_string()),
            default_model: None,
            claude_api_key: None,
            openai_api_key: None,
            ollama_url: None,
            week_start: WeekStart::default(),
            notification_hour: DEFAULT_NOTIFICATION_HOUR,
            templates: default_templates(),
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

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }

    /// Location of the contact database.
    pub fn data_path() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join(APP_DIR).join("followup.sqlite"))
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::OpenAI)
    }

    pub fn notification_configuration(&self) -> NotificationConfiguration {
        NotificationConfiguration::at_hour(self.notification_hour.min(23))
    }

    pub fn template(&self, id_or_label: &str) -> Option<&ConversationStarterTemplate> {
        self.templates
            .iter()
            .find(|t| t.id == id_or_label)
            .or_else(|| {
                self.templates
                    .iter()
                    .find(|t| t.title().eq_ignore_ascii_case(id_or_label))
            })
    }

    /// The API key configured for `provider`, if it needs one.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Ollama => None,
            Provider::Claude => self.claude_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
        }
        .filter(|key| !key.trim().is_empty())
    }

    /// Build the text generator for the configured provider.
    pub fn text_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        let provider = self.provider();
        let model = self.default_model.as_deref();

        let key = match self.api_key(provider) {
            Some(key) => key,
            None if provider.requires_api_key() => {
                return Err(anyhow!("No {} API key configured", provider.display_name()))
            }
            None => "",
        };

        let generator: Arc<dyn TextGenerator> = match provider {
            Provider::Ollama => {
                let client = OllamaClient::new(self.ollama_url());
                Arc::new(match model {
                    Some(m) => client.with_model(m),
                    None => client,
                })
            }
            Provider::Claude => {
                let client = ClaudeClient::new(key);
                Arc::new(match model {
                    Some(m) => client.with_model(m),
                    None => client,
                })
            }
            Provider::OpenAI => {
                let client = OpenAIClient::new(key);
                Arc::new(match model {
                    Some(m) => client.with_model(m),
                    None => client,
                })
            }
        };
        log::debug!("Using {} for intelligent starters", provider.display_name());
        Ok(generator)
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(ollama::DEFAULT_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.provider(), Provider::OpenAI);
        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.notification_hour, 18);
        assert_eq!(config.templates.len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("followup").join("config.json");

        let mut config = Config::new();
        config.provider = Some("ollama".to_string());
        config.week_start = WeekStart::Sunday;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.week_start, WeekStart::Sunday);
        assert_eq!(loaded.templates, config.templates);
        assert!(loaded.text_generator().is_ok());
    }

    #[test]
    fn test_older_config_fills_new_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"provider":"claude","default_model":null,"claude_api_key":null,"openai_api_key":null}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider(), Provider::Claude);
        assert_eq!(config.notification_hour, DEFAULT_NOTIFICATION_HOUR);
        assert!(config.template("How are you?").is_some());
        assert!(config.text_generator().is_err());
    }

    #[test]
    fn test_api_key_required_only_for_hosted_providers() {
        let mut config = Config::new();
        config.openai_api_key = Some("  ".to_string());
        assert_eq!(config.api_key(Provider::OpenAI), None);
        assert!(config.text_generator().is_err());

        config.openai_api_key = Some("sk-test".to_string());
        assert_eq!(config.api_key(Provider::OpenAI), Some("sk-test"));
        assert!(config.text_generator().is_ok());

        config.provider = Some("ollama".to_string());
        assert_eq!(config.api_key(Provider::Ollama), None);
        assert!(config.text_generator().is_ok());
        assert_eq!(config.ollama_url(), "http://localhost:11434");
    }
}
