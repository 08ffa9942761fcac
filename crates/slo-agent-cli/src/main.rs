mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slo_agent::agent::Agent;
use slo_agent::config::{LlmConfig, LlmOverrides};
use slo_agent::providers::configs::ProviderConfig;
use slo_agent::providers::factory::get_provider;
use slo_agent::tools::applications::InstanaSettings;
use slo_agent::tools::ToolRegistry;

use crate::session::session_file::{ensure_session_dir, session_path};
use crate::session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider to use: openai, watsonx or vllm (overrides LLM_PROVIDER)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (overrides MODEL_NAME)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature in [0, 1] (overrides TEMPERATURE)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Maximum tool round trips per turn
    #[arg(long, default_value_t = slo_agent::agent::DEFAULT_MAX_TOOL_ROUNDS)]
    max_tool_rounds: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start or resume an interactive chat session
    Session {
        /// Session name; a fresh one is generated when omitted
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Run a single message headlessly and print the response
    Run {
        /// The message to send
        #[arg(short, long)]
        input: String,

        /// Session name to append the turn to
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn build_agent(cli: &Cli) -> Result<Agent> {
    let overrides = LlmOverrides {
        provider: cli.provider.clone(),
        model_name: cli.model.clone(),
        temperature: cli.temperature,
        ..Default::default()
    };
    let config = LlmConfig::load(overrides, &slo_agent::config::RealEnvironment)?;
    let provider = get_provider(ProviderConfig::from_llm_config(&config)?)?;
    let registry = ToolRegistry::with_builtins(InstanaSettings::from_env());

    Ok(Agent::new(provider, registry).with_max_tool_rounds(cli.max_tool_rounds))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let agent = build_agent(&cli)?;

    match &cli.command {
        Command::Session { name } => {
            let session_dir = ensure_session_dir()?;
            let session_file = session_path(&session_dir, name.as_deref());
            let mut session = Session::new(agent, session_file)?;
            session.start().await?;
        }
        Command::Run { input, name } => {
            let session_dir = ensure_session_dir()?;
            let session_file = session_path(&session_dir, name.as_deref());
            let mut session = Session::new(agent, session_file)?;
            session.headless(input).await?;
        }
    }

    Ok(())
}
