//! WriteFlow command-line front end (spec §6): a minimal command with
//! slash-prefixed sub-commands, mapped onto the runtime's message types.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use writeflow_core::Session;
use writeflow_core::config;
use writeflow_protocol::AgentResponseKind;
use writeflow_protocol::Message;
use writeflow_protocol::MessageType;
use writeflow_protocol::Priority;

#[derive(Parser, Debug)]
#[command(name = "writeflow", about = "WriteFlow writing-agent runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// /outline <topic> - draft an article outline
    Outline { topic: Vec<String> },
    /// /research <topic> - gather research material
    Research { topic: Vec<String> },
    /// /rewrite <style> <content> - rewrite content in a given style
    Rewrite { style: String, content: Vec<String> },
    /// /model - show the configured model profiles and pointers
    Model,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("writeflow_core=info,writeflow_cli=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Fills in a profile's `apiKey` from its provider's environment variable
/// when the config file left it blank (spec §6).
fn resolve_api_keys(config: &mut writeflow_protocol::Config) {
    for profile in &mut config.model_profiles {
        if profile.api_key.is_empty() {
            if let Some(var) = config::env_var_for_provider(&profile.provider) {
                if let Ok(key) = env::var(var) {
                    profile.api_key = key;
                }
            }
        }
    }
}

async fn run_turn(session: &Arc<Session>, message: Message) -> Result<ExitCode> {
    let mut rx = session.agent_loop.submit(message).await;
    let mut failed = false;
    while let Some(response) = rx.recv().await {
        match response.kind {
            AgentResponseKind::Error => {
                eprintln!("error: {}", response.content);
                failed = true;
            }
            _ => println!("{}", response.content),
        }
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();

    let cli = Cli::parse();
    let dir = config::config_dir().context("resolving config directory")?;
    let mut cfg = config::load(&dir).context("loading config")?;
    resolve_api_keys(&mut cfg);

    if let Command::Model = cli.command {
        if cfg.model_profiles.is_empty() {
            println!("no model profiles configured in {}", dir.display());
        }
        for profile in &cfg.model_profiles {
            println!("{} ({}: {})", profile.name, profile.provider, profile.model_name);
        }
        println!(
            "pointers: main={:?} task={:?} reasoning={:?} quick={:?}",
            cfg.model_pointers.main, cfg.model_pointers.task, cfg.model_pointers.reasoning, cfg.model_pointers.quick
        );
        return Ok(ExitCode::SUCCESS);
    }

    let working_dir = env::current_dir().context("resolving working directory")?;
    let session = Session::new(cfg, working_dir);
    let runner = Arc::clone(&session);
    let loop_task = tokio::spawn(async move { runner.run().await });

    let message = match cli.command {
        Command::Outline { topic } => Message::new(
            MessageType::SlashCommand,
            Priority::Normal,
            json!({"command": "outline", "topic": topic.join(" ")}),
            "cli",
        ),
        Command::Research { topic } => Message::new(
            MessageType::SlashCommand,
            Priority::Normal,
            json!({"command": "research", "topic": topic.join(" ")}),
            "cli",
        ),
        Command::Rewrite { style, content } => Message::new(
            MessageType::UserInput,
            Priority::Normal,
            json!({"intent": "edit", "text": format!("rewrite in {style} style: {}", content.join(" "))}),
            "cli",
        ),
        Command::Model => unreachable!("handled above"),
    };

    let exit_code = run_turn(&session, message).await?;
    session.shutdown().await;
    let _ = loop_task.await;
    Ok(exit_code)
}
