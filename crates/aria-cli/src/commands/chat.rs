use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use aria_config::AriaConfig;
use aria_core::{AriaError, Result, ToolRegistry};
use aria_device::DeviceTools;
use aria_llm::AnthropicProvider;
use aria_runtime::{AgentReply, AgentSettings, Orchestrator};
use tokio::io::AsyncBufReadExt;
use tracing::info;

use super::device::{android_bridge, automation_client};

/// Wire the LLM provider, phone tools and agent settings from config.
pub(super) async fn build_orchestrator(config: &AriaConfig) -> Result<Orchestrator> {
    let api_key = config.services.anthropic_api_key.clone().ok_or_else(|| {
        AriaError::Config(
            "no Anthropic API key: set services.anthropic_api_key in aria.toml or ANTHROPIC_API_KEY".into(),
        )
    })?;

    let provider = AnthropicProvider::new(api_key)
        .with_base_url(config.services.anthropic_base_url.clone())
        .with_timeouts(
            Duration::from_secs(config.agent.connect_timeout_secs),
            Duration::from_secs(config.agent.request_timeout_secs),
        )?;

    let android = android_bridge(config);
    let client = automation_client(config, &android).await;
    let tools = Arc::new(DeviceTools::new(Arc::new(client), Arc::new(android)));

    let mut registry = ToolRegistry::new().with_rate_limit(config.agent.tool_rate_limit_per_minute);
    let count = tools.register_all(&mut registry)?;

    let settings = AgentSettings::from_config(&config.agent)?;
    info!(model = %settings.model, tools = count, bridge = %config.bridge.address(), "orchestrator ready");

    Ok(Orchestrator::new(Arc::new(provider), Arc::new(registry), settings))
}

pub(super) async fn cmd_ask(config: AriaConfig, session: String, text: String) -> Result<()> {
    let orchestrator = build_orchestrator(&config).await?;
    let reply = orchestrator.run(&session, &text).await;
    if reply.is_error {
        return Err(AriaError::Agent(reply.text));
    }
    println!("{}", reply.text);
    Ok(())
}

pub(super) async fn cmd_chat(config: AriaConfig, session: String) -> Result<()> {
    println!("Aria interactive chat");
    println!("   Type 'exit' or Ctrl+C to quit");
    println!("   Type '/reset' to clear the conversation");
    println!();

    let orchestrator = build_orchestrator(&config).await?;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "exit" | "quit" | "/exit" => {
                println!("Goodbye!");
                break;
            }
            "/reset" => {
                orchestrator.sessions().reset(&session).await;
                println!("\x1b[90m   conversation cleared\x1b[0m");
                continue;
            }
            _ => {}
        }

        let reply = orchestrator.run(&session, trimmed).await;
        print_reply(&reply);
        println!();
    }

    Ok(())
}

fn print_reply(reply: &AgentReply) {
    if reply.is_error {
        println!("\x1b[31m{}\x1b[0m", reply.text);
        return;
    }
    eprint!("\x1b[32maria>\x1b[0m ");
    println!("{}", reply.text);
    eprintln!(
        "\x1b[90m   [{} model calls, {} tool calls, {} in / {} out]\x1b[0m",
        reply.model_calls, reply.tool_calls, reply.usage.input_tokens, reply.usage.output_tokens
    );
}
