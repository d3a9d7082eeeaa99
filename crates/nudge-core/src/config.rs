use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NudgeError, Result};

/// Top-level configuration for the reminder assistant.
///
/// Loaded from `~/.nudge/config.toml` by default. Every section falls back to
/// its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub flows: FlowsConfig,
}

impl NudgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NudgeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NudgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// The configured IANA timezone. Unknown names fall back to UTC.
    pub fn timezone(&self) -> Tz {
        match self.general.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    timezone = %self.general.timezone,
                    "Unknown timezone in config, using UTC"
                );
                Tz::UTC
            }
        }
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// IANA timezone name used to interpret and display due dates.
    pub timezone: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Data directory for the SQLite database.
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            log_level: "info".to_string(),
            data_dir: "~/.nudge/data".to_string(),
        }
    }
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible completion server.
    pub base_url: String,
    /// Model name passed with each request.
    pub model: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout_secs: u64,
    /// Number of generative calls allowed in flight process-wide.
    pub max_in_flight: usize,
    /// Source content is truncated to this many characters before prompting.
    pub max_prompt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            request_timeout_secs: 120,
            max_in_flight: 1,
            max_prompt_chars: 22_000,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name, relative to `general.data_dir` unless absolute.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "nudge.db".to_string(),
        }
    }
}

/// Conversational flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowsConfig {
    /// The add wizard refuses to finish without at least one topic.
    pub require_topic_on_add: bool,
    /// Log every date resolution decision at info level.
    pub datetime_parse_debug: bool,
    /// Source content at least this long replaces draft notes.
    pub long_notes_threshold: usize,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            require_topic_on_add: false,
            datetime_parse_debug: false,
            long_notes_threshold: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config_values() {
        let config = NudgeConfig::default();
        assert_eq!(config.general.timezone, "UTC");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.max_in_flight, 1);
        assert_eq!(config.llm.max_prompt_chars, 22_000);
        assert_eq!(config.storage.db_path, "nudge.db");
        assert!(!config.flows.require_topic_on_add);
        assert!(!config.flows.datetime_parse_debug);
        assert_eq!(config.flows.long_notes_threshold, 250);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let content = r#"
[general]
timezone = "Asia/Singapore"

[llm]
max_in_flight = 2
"#;
        let file = create_temp_config(content);
        let config = NudgeConfig::load(file.path()).unwrap();
        assert_eq!(config.general.timezone, "Asia/Singapore");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.llm.max_in_flight, 2);
        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.flows.long_notes_threshold, 250);
    }

    #[test]
    fn test_timezone_resolution() {
        let mut config = NudgeConfig::default();
        config.general.timezone = "Asia/Singapore".to_string();
        assert_eq!(config.timezone(), chrono_tz::Asia::Singapore);

        config.general.timezone = "Mars/Olympus".to_string();
        assert_eq!(config.timezone(), Tz::UTC);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(NudgeConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = NudgeConfig::load_or_default(Path::new("/nonexistent/nudge/config.toml"));
        assert_eq!(config.general.timezone, "UTC");
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = NudgeConfig::default();
        config.flows.require_topic_on_add = true;
        config.save(&path).unwrap();

        let reloaded = NudgeConfig::load(&path).unwrap();
        assert!(reloaded.flows.require_topic_on_add);
        assert_eq!(reloaded.general.log_level, "info");
    }
}
