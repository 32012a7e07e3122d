//! Process configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::llm::ollama::ollama_base_url_from_env;
use crate::theme::ThemeMode;

/// Default chat completion model.
const DEFAULT_CHAT_MODEL: &str = "gpt-oss:120b-cloud";

/// Default theme generation model (fast, small).
const DEFAULT_THEME_MODEL: &str = "glm-4.6:cloud";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct MoodchatConfig {
    /// HTTP/WebSocket listen port.
    pub port: u16,
    /// `SQLite` database path.
    pub database_path: PathBuf,
    /// Ollama API base URL.
    pub ollama_base_url: String,
    /// Main conversation model.
    pub chat_model: String,
    /// Theme derivation model.
    pub theme_model: String,
    /// Which theme descriptor variant this deployment produces.
    pub theme_mode: ThemeMode,
    /// Recent messages supplied to the completion model per turn.
    pub context_window: usize,
    /// Upper bound on one completion call, stream included.
    pub completion_timeout: Duration,
    /// Upper bound on one theme derivation.
    pub theme_timeout: Duration,
    /// Maximum accepted context-file upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for MoodchatConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: PathBuf::from("moodchat.db"),
            ollama_base_url: ollama_base_url_from_env(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            theme_model: DEFAULT_THEME_MODEL.to_string(),
            theme_mode: ThemeMode::Palette,
            context_window: 20,
            completion_timeout: Duration::from_secs(60),
            theme_timeout: Duration::from_secs(10),
            max_upload_bytes: 1_000_000,
        }
    }
}

impl MoodchatConfig {
    /// Build a configuration from `MOODCHAT_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse("MOODCHAT_PORT") {
            config.port = port;
        }
        if let Ok(path) = std::env::var("MOODCHAT_DB") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(model) = std::env::var("MOODCHAT_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = std::env::var("MOODCHAT_THEME_MODEL") {
            config.theme_model = model;
        }
        if let Some(mode) = env_parse("MOODCHAT_THEME_MODE") {
            config.theme_mode = mode;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = MoodchatConfig::default();
        assert_eq!(config.context_window, 20);
        assert_eq!(config.completion_timeout, Duration::from_secs(60));
        assert_eq!(config.theme_timeout, Duration::from_secs(10));
        assert_eq!(config.max_upload_bytes, 1_000_000);
    }

    #[test]
    fn test_theme_mode_parses() {
        assert_eq!(" Palette ".parse::<ThemeMode>(), Ok(ThemeMode::Palette));
        assert_eq!("category".parse::<ThemeMode>(), Ok(ThemeMode::Category));
        assert!("mood".parse::<ThemeMode>().is_err());
    }
}
