use super::{
    base::Provider, configs::ProviderConfig, openai::OpenAiProvider, vllm::VllmProvider,
    watsonx::WatsonxProvider,
};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Watsonx(watsonx_config) => {
            Ok(Box::new(WatsonxProvider::new(watsonx_config)?))
        }
        ProviderConfig::Vllm(vllm_config) => Ok(Box::new(VllmProvider::new(vllm_config)?)),
    }
}
