use std::sync::Arc;

use super::{
    base::CompletionEngine,
    configs::ProviderConfig,
    openai::{OpenAiEngine, OpenAiEngineConfig},
};
use crate::errors::ChatResult;

pub fn get_engine(config: ProviderConfig) -> ChatResult<Arc<dyn CompletionEngine>> {
    let engine_config = match config {
        ProviderConfig::OpenAi(openai) => OpenAiEngineConfig {
            host: openai.host,
            api_key: Some(openai.api_key),
            model: openai.model,
            temperature: openai.temperature,
            max_tokens: openai.max_tokens,
        },
        // Ollama serves the OpenAI chat completions api without a key
        ProviderConfig::Ollama(ollama) => OpenAiEngineConfig {
            host: ollama.host,
            api_key: None,
            model: ollama.model,
            temperature: ollama.temperature,
            max_tokens: ollama.max_tokens,
        },
    };
    Ok(Arc::new(OpenAiEngine::new(engine_config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::{OllamaProviderConfig, OLLAMA_HOST, OLLAMA_MODEL};

    #[test]
    fn test_profile_model_override() {
        let config = ProviderConfig::Ollama(OllamaProviderConfig {
            host: OLLAMA_HOST.to_string(),
            model: OLLAMA_MODEL.to_string(),
            temperature: Some(0.75),
            max_tokens: None,
        })
        .with_model("bielik:7bQ4");
        assert_eq!(config.model(), "bielik:7bQ4");
        assert!(get_engine(config).is_ok());
    }
}
