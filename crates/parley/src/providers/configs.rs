pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";
pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "SpeakLeash/bielik-7b-instruct-v0.1-gguf";

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi(config) => &config.model,
            ProviderConfig::Ollama(config) => &config.model,
        }
    }

    /// Same provider, different model; used for chat profiles
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        match &mut self {
            ProviderConfig::OpenAi(config) => config.model = model.into(),
            ProviderConfig::Ollama(config) => config.model = model.into(),
        }
        self
    }

    pub fn temperature(&self) -> Option<f32> {
        match self {
            ProviderConfig::OpenAi(config) => config.temperature,
            ProviderConfig::Ollama(config) => config.temperature,
        }
    }

    /// Fill in the temperature unless the provider already sets one
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        match &mut self {
            ProviderConfig::OpenAi(config) => {
                config.temperature.get_or_insert(temperature);
            }
            ProviderConfig::Ollama(config) => {
                config.temperature.get_or_insert(temperature);
            }
        }
        self
    }
}
