use crate::config::{ConfigError, LlmConfig, LlmProvider};

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Watsonx(WatsonxProviderConfig),
    Vllm(VllmProviderConfig),
}

// Define specific config structs for each provider
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct WatsonxProviderConfig {
    pub url: String,
    pub api_key: String,
    pub project_id: String,
    pub model: String,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct VllmProviderConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    /// Project resolved LLM settings onto the selected provider's transport
    /// parameters.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let missing = |var: &str| ConfigError::MissingCredential {
            provider: config.provider.to_string(),
            var: var.to_string(),
        };
        match config.provider {
            LlmProvider::OpenAi => Ok(ProviderConfig::OpenAi(OpenAiProviderConfig {
                host: config.openai_host.clone(),
                api_key: config
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| missing("OPENAI_API_KEY"))?,
                model: config.model_name.clone(),
                temperature: Some(config.temperature),
            })),
            LlmProvider::Watsonx => Ok(ProviderConfig::Watsonx(WatsonxProviderConfig {
                url: config.watsonx_url.clone(),
                api_key: config
                    .watsonx_api_key
                    .clone()
                    .ok_or_else(|| missing("WATSONX_API_KEY"))?,
                project_id: config
                    .watsonx_project_id
                    .clone()
                    .ok_or_else(|| missing("WATSONX_PROJECT_ID"))?,
                model: config.model_name.clone(),
                temperature: Some(config.temperature),
            })),
            LlmProvider::Vllm => Ok(ProviderConfig::Vllm(VllmProviderConfig {
                api_base: config
                    .vllm_api_base
                    .clone()
                    .ok_or_else(|| missing("VLLM_API_BASE"))?,
                api_key: config.vllm_api_key.clone(),
                model: config.model_name.clone(),
                temperature: Some(config.temperature),
            })),
        }
    }
}
