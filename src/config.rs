//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `MANGAD_`-prefixed environment variables (`__` separates nested keys).
//! API keys come from `GROQ_API_KEY` and `TOGETHER_API_KEY` and are never
//! serialized.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::genre::Genre;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "mangad.toml";

/// Sample scenario pre-filled in the prompt field
pub const DEFAULT_PROMPT: &str = "Two high school students, Taki from Tokyo and Mitsuha from a rural town, \
mysteriously switch bodies. Communicating through messages, they develop feelings for each other. \
As they try to meet, a shocking truth unfolds, testing love, fate, and destiny.";

/// Genre selected in a fresh form
pub const DEFAULT_GENRE: Genre = Genre::Romance;

/// Environment variable holding the language model key
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

/// Environment variable holding the image model key
pub const TOGETHER_API_KEY_VAR: &str = "TOGETHER_API_KEY";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "mixtral-8x7b-32768".to_string(),
            temperature: 0.0,
            max_tokens: 300,
            api_key: None,
        }
    }
}

/// Image model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub base_url: String,
    pub model: String,
    pub steps: u32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.together.xyz/v1".to_string(),
            model: "black-forest-labs/FLUX.1-schnell-Free".to_string(),
            steps: 4,
            api_key: None,
        }
    }
}

/// Initial form values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefaults {
    pub prompt: String,
    pub genre: Genre,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            genre: DEFAULT_GENRE,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Timeout applied to every upstream request
    pub request_timeout_secs: u64,
    /// Sessions unseen for this long are removed; 0 keeps them forever
    pub session_idle_secs: u64,
    /// How often idle sessions are looked for
    pub session_sweep_secs: u64,
    pub log_format: LogFormat,
    pub story: StoryConfig,
    pub image: ImageConfig,
    pub defaults: FormDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            request_timeout_secs: 60,
            session_idle_secs: 3600,
            session_sweep_secs: 60,
            log_format: LogFormat::default(),
            story: StoryConfig::default(),
            image: ImageConfig::default(),
            defaults: FormDefaults::default(),
        }
    }
}

impl Config {
    /// Build the layered figment for an optional config file path
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("MANGAD_").split("__"))
    }

    /// Extract a config from a figment, filling API keys from the environment
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        let mut config: Config = figment.extract()?;
        if config.story.api_key.is_none() {
            config.story.api_key = env_key(GROQ_API_KEY_VAR);
        }
        if config.image.api_key.is_none() {
            config.image.api_key = env_key(TOGETHER_API_KEY_VAR);
        }
        Ok(config)
    }

    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::from_figment(&Self::figment(path))
    }
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.story.temperature, 0.0);
        assert_eq!(config.story.max_tokens, 300);
        assert_eq!(config.image.steps, 4);
        assert_eq!(config.session_idle_secs, 3600);
        assert_eq!(config.session_sweep_secs, 60);
        assert_eq!(config.defaults.prompt, DEFAULT_PROMPT);
        assert_eq!(config.defaults.genre, Genre::Romance);
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                bind_addr = "0.0.0.0:9000"
                log_format = "json"

                [story]
                model = "llama-3.1-8b-instant"

                [defaults]
                genre = "Sci-Fi"
                "#,
            )?;
            jail.set_env("MANGAD_IMAGE__STEPS", "8");
            jail.set_env("MANGAD_SESSION_IDLE_SECS", "600");
            jail.set_env(GROQ_API_KEY_VAR, "gsk-test");
            jail.set_env(TOGETHER_API_KEY_VAR, "");

            let config = Config::load(None)?;
            assert_eq!(config.bind_addr.port(), 9000);
            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.story.model, "llama-3.1-8b-instant");
            // Unset keys keep their defaults
            assert_eq!(config.story.max_tokens, 300);
            assert_eq!(config.image.steps, 8);
            assert_eq!(config.session_idle_secs, 600);
            assert_eq!(config.defaults.genre, Genre::SciFi);
            assert_eq!(config.story.api_key.as_deref(), Some("gsk-test"));
            // Blank keys count as missing
            assert_eq!(config.image.api_key, None);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs = 5").unwrap();

        let config = Config::from_figment(&Config::figment(Some(file.path()))).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let mut config = Config::default();
        config.story.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
