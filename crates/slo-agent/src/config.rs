use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const WATSONX_DEFAULT_URL: &str = "https://us-south.ml.cloud.ibm.com";
pub const VLLM_DEFAULT_API_KEY: &str = "EMPTY";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Missing credential for the {provider} provider: set {var}")]
    MissingCredential { provider: String, var: String },

    #[error("Temperature must be a number in [0, 1], got {0}")]
    InvalidTemperature(String),
}

/// Read access to environment variables, so configuration loading stays a
/// pure function over a snapshot and tests never touch the process
/// environment.
pub trait Environment {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
pub struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn get_var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Watsonx,
    Vllm,
}

impl LlmProvider {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        Self::from_str(name).map_err(|_| ConfigError::UnknownProvider(name.to_string()))
    }
}

/// Explicit settings that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub provider: Option<String>,
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
    pub openai_api_key: Option<String>,
    pub openai_host: Option<String>,
    pub watsonx_api_key: Option<String>,
    pub watsonx_project_id: Option<String>,
    pub watsonx_url: Option<String>,
    pub vllm_api_base: Option<String>,
    pub vllm_api_key: Option<String>,
}

/// Resolved LLM settings. Built once at agent construction and immutable
/// afterwards; provider-specific credentials are verified here rather than
/// on first use.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model_name: String,
    pub temperature: f32,
    pub openai_api_key: Option<String>,
    pub openai_host: String,
    pub watsonx_api_key: Option<String>,
    pub watsonx_project_id: Option<String>,
    pub watsonx_url: String,
    pub vllm_api_base: Option<String>,
    pub vllm_api_key: String,
}

impl LlmConfig {
    /// Resolve configuration from explicit overrides and an environment
    /// snapshot, overrides first.
    pub fn load(overrides: LlmOverrides, env: &impl Environment) -> Result<Self, ConfigError> {
        let provider_name = overrides
            .provider
            .or_else(|| env.get_var("LLM_PROVIDER"))
            .unwrap_or_else(|| "openai".to_string());
        let provider = LlmProvider::parse(&provider_name)?;

        let model_name = overrides
            .model_name
            .or_else(|| env.get_var("MODEL_NAME"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match overrides.temperature {
            Some(t) => t,
            None => match env.get_var("TEMPERATURE") {
                Some(raw) => raw
                    .parse::<f32>()
                    .map_err(|_| ConfigError::InvalidTemperature(raw.clone()))?,
                None => DEFAULT_TEMPERATURE,
            },
        };
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature.to_string()));
        }

        let config = LlmConfig {
            provider,
            model_name,
            temperature,
            openai_api_key: overrides
                .openai_api_key
                .or_else(|| env.get_var("OPENAI_API_KEY")),
            openai_host: overrides
                .openai_host
                .or_else(|| env.get_var("OPENAI_HOST"))
                .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string()),
            watsonx_api_key: overrides
                .watsonx_api_key
                .or_else(|| env.get_var("WATSONX_API_KEY")),
            watsonx_project_id: overrides
                .watsonx_project_id
                .or_else(|| env.get_var("WATSONX_PROJECT_ID")),
            watsonx_url: overrides
                .watsonx_url
                .or_else(|| env.get_var("WATSONX_URL"))
                .unwrap_or_else(|| WATSONX_DEFAULT_URL.to_string()),
            vllm_api_base: overrides
                .vllm_api_base
                .or_else(|| env.get_var("VLLM_API_BASE")),
            vllm_api_key: overrides
                .vllm_api_key
                .or_else(|| env.get_var("VLLM_API_KEY"))
                .unwrap_or_else(|| VLLM_DEFAULT_API_KEY.to_string()),
        };

        config.check_credentials()?;
        Ok(config)
    }

    /// Resolve configuration from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(LlmOverrides::default(), &RealEnvironment)
    }

    fn check_credentials(&self) -> Result<(), ConfigError> {
        let missing = |var: &str| ConfigError::MissingCredential {
            provider: self.provider.to_string(),
            var: var.to_string(),
        };
        match self.provider {
            LlmProvider::OpenAi => {
                if self.openai_api_key.is_none() {
                    return Err(missing("OPENAI_API_KEY"));
                }
            }
            LlmProvider::Watsonx => {
                if self.watsonx_api_key.is_none() {
                    return Err(missing("WATSONX_API_KEY"));
                }
                if self.watsonx_project_id.is_none() {
                    return Err(missing("WATSONX_PROJECT_ID"));
                }
            }
            LlmProvider::Vllm => {
                if self.vllm_api_base.is_none() {
                    return Err(missing("VLLM_API_BASE"));
                }
            }
        }
        Ok(())
    }
}
