use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};

use toolgate::agent::{self, AgentEvent, ChatTurn};
use toolgate::config::RuntimeConfig;
use toolgate::gateway::{self, GatewayClient};

#[derive(Parser)]
#[command(name = "toolgate", version, about = "Tool-orchestrated chat assistant core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capability registry over stdio (worker mode).
    Serve,
    /// Ask one question, streaming progress and the answer.
    Chat {
        /// The user message.
        message: String,
        /// Emit the raw event stream as JSON lines instead of text.
        #[arg(long)]
        json: bool,
    },
    /// List the available tools through a freshly spawned worker.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    toolgate::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            gateway::server::serve().await.context("serve loop failed")?;
        }
        Command::Chat { message, json } => {
            run_chat(&message, json).await?;
        }
        Command::Tools => {
            let config = RuntimeConfig::load();
            let client = GatewayClient::from_config(&config);
            let tools = client
                .list_tools()
                .await
                .context("listing tools through a worker")?;
            for tool in tools {
                println!("{:<24} {}", tool.name, tool.description);
            }
        }
    }
    Ok(())
}

async fn run_chat(message: &str, json: bool) -> anyhow::Result<()> {
    let config = RuntimeConfig::load();
    let turns = vec![ChatTurn::user(message)];

    let mut failed: Option<String> = None;
    let mut emit = |event: AgentEvent| {
        if json {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
            if let AgentEvent::Error { message } = event {
                failed = Some(message);
            }
            return;
        }
        match event {
            AgentEvent::Delta { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            AgentEvent::ToolStart { step, tool_name, .. } => {
                eprintln!("[step {step}] calling {tool_name}...");
            }
            AgentEvent::ToolResult { ok, duration_ms, summary, .. } => {
                let status = if ok { "ok" } else { "failed" };
                eprintln!("  -> {status} in {duration_ms}ms: {summary}");
            }
            AgentEvent::Done => println!(),
            AgentEvent::Error { message } => {
                failed = Some(message);
            }
        }
    };

    agent::stream_chat(&config, &turns, &mut emit).await;

    if let Some(message) = failed {
        anyhow::bail!("chat request failed: {message}");
    }
    Ok(())
}
