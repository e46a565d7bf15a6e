//! LangNode CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `langnode.toml`, apply command-line
//!    overrides, and validate the result.
//! 2. **Wire observability**: configure `tracing-subscriber` and, when an
//!    endpoint is configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: build the configured
//!    [`pipeline::LlmClientFactory`] and inject it into [`nodes::LlmNode`].
//! 4. **Run once**: read a conversation state document (file or stdin), run
//!    the node over it, and write the updated state as JSON.

mod config;
mod observability;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use llm::{AnthropicFactory, ScriptedFactory};
use nodes::LlmNode;
use pipeline::{ConversationState, LlmClientFactory, MessageSource, Node};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{CliConfig, LogFormat, ProviderKind};

/// Run the LLM node over a conversation state document.
#[derive(Debug, Parser)]
#[command(name = "langnode", version, about)]
struct Args {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = "langnode.toml")]
    config: PathBuf,

    /// State document to read, or `-` for stdin.
    #[arg(long, default_value = "-")]
    state: String,

    /// Where to write the updated state; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overrides `llm.provider`.
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Overrides `node.message_source` (`state_messages` or `prompt_messages`).
    #[arg(long)]
    message_source: Option<MessageSource>,

    /// Overrides `observability.log_format`.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Args {
    fn apply_overrides(&self, config: &mut CliConfig) {
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
        }
        if let Some(source) = self.message_source {
            config.node.message_source = source;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = CliConfig::load(&args.config)
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    args.apply_overrides(&mut config);
    config.validate()?;

    let telemetry = observability::init(&config.observability)?;

    let result = run(&args, &config).await;
    if let Err(e) = &result {
        tracing::error!("Run failed: {e:#}");
    }

    telemetry.shutdown();
    result
}

async fn run(args: &Args, config: &CliConfig) -> anyhow::Result<()> {
    let input = read_state(&args.state).await?;
    let mut state = ConversationState::from_json(&input)
        .with_context(|| format!("Failed to load state from {}", args.state))?;

    let node = LlmNode::new(config.node_id()?, build_factory(config)?)
        .with_message_source(config.node.message_source);
    tracing::info!(
        node = %node.id(),
        provider = ?config.llm.provider,
        messages = state.messages.len(),
        "Running node"
    );

    node.run(&mut state).await?;

    let output = state.to_json_pretty()?;
    write_output(args.output.as_ref(), &output).await
}

fn build_factory(config: &CliConfig) -> anyhow::Result<Box<dyn LlmClientFactory>> {
    let factory: Box<dyn LlmClientFactory> = match config.llm.provider {
        ProviderKind::Anthropic => Box::new(AnthropicFactory::new(config.anthropic_config()?)?),
        ProviderKind::Scripted => {
            Box::new(ScriptedFactory::new(config.llm.scripted_response.clone()))
        }
    };
    Ok(factory)
}

async fn read_state(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read state from stdin")?;
        Ok(input)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read state file {source}"))
    }
}

async fn write_output(path: Option<&PathBuf>, output: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, format!("{output}\n"))
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
