use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use parley::memory::DEFAULT_MEMORY_LIMIT;
use parley::providers::configs::{
    OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig, OLLAMA_HOST, OLLAMA_MODEL,
    OPENAI_HOST, OPENAI_MODEL,
};
use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_TEMPERATURE: f32 = 0.75;

/// Sessions kept before the least recently used one is dropped
pub const DEFAULT_MAX_SESSIONS: usize = 256;

pub const DEFAULT_PROMPT: &str = "\
Jesteś przyjaznym botem. Rozmawiaj na wszystkie tematy i bądź miły.

Możesz dostać od użytkownika dodatkowe materiały, użyj ich jeśli są przydatne lub zignoruj.

ZAWSZE ODPOWIADAJ PO POLSKU!
";

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

/// A canned first message offered to new users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Starter {
    pub label: String,
    pub message: String,
}

impl Starter {
    fn new(label: &str, message: &str) -> Self {
        Self {
            label: label.to_string(),
            message: message.to_string(),
        }
    }
}

/// Defaults for new chat sessions. Each profile names the model a session
/// talks to.
///
/// Attachments may only reference files under `upload_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub temperature: f32,
    pub memory_limit: usize,
    pub profiles: Vec<String>,
    pub default_profile: String,
    pub starters: Vec<Starter>,
    pub upload_dir: PathBuf,
    pub max_sessions: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            profiles: vec![
                "bielik:7b".to_string(),
                "bielik:7bQ4".to_string(),
                "bielik:7bQ8".to_string(),
            ],
            default_profile: "bielik:7bQ8".to_string(),
            starters: vec![
                Starter::new("Poezja", "wielkim poetą był... o kim tak mówiono?"),
                Starter::new(
                    "Co to znaczy?",
                    "Co to znaczy jak ktoś powiedział do mnie \"ej weźże no!\" ?",
                ),
                Starter::new("Powódź", "Czy powódź jest zjawiskiem ekstremalnym?"),
            ],
            upload_dir: std::env::temp_dir().join("parley-uploads"),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.type", "ollama")?
            // Optional parley.toml next to the binary, then the environment
            .add_source(File::with_name("parley").required(false))
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => settings.validate(),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let Some(field) = missing_field(&err.to_string()) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.chat.max_sessions == 0 {
            return Err(ConfigError::Other(config::ConfigError::Message(
                "chat.max_sessions must be at least 1".to_string(),
            )));
        }
        if !self.chat.profiles.contains(&self.chat.default_profile) {
            return Err(ConfigError::Other(config::ConfigError::Message(format!(
                "default profile {} is not one of the chat profiles",
                self.chat.default_profile
            ))));
        }
        Ok(self)
    }
}

/// Dotted key of a field reported missing, e.g. "missing field `api_key` for key `provider`"
fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let (field, rest) = rest.split_once('`')?;
    let key = rest
        .trim()
        .strip_prefix("for key ")
        .map(|key| key.trim_matches(|c| c == '`' || c == '"'));
    match key {
        Some(key) if !key.is_empty() => Some(format!("{}.{}", key, field)),
        _ if field == "api_key" => Some(format!("provider.{}", field)),
        _ => Some(field.to_string()),
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_ollama_host() -> String {
    OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    OLLAMA_MODEL.to_string()
}
