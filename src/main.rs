//! toolplan - Entry Point
//!
//! Modes:
//! - Default: ask for a plan and run it with the built-in capabilities
//! - --chat / -c: answer directly, no planning

use toolplan::{builtin, Agent, AgentConfig, ResponseShape};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const PURPOSE: &str = "You are a precise assistant that solves requests by calling the available tools. \
Break the request into the smallest sequence of tool calls and chain results between calls when needed.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let chat_mode = args.iter().any(|a| a == "--chat" || a == "-c");
    let json_mode = args.iter().any(|a| a == "--json" || a == "-j");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let log_json = args.iter().any(|a| a == "--log-json");
    let request = args
        .iter()
        .filter(|a| !a.starts_with('-'))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    if help_mode || request.is_empty() {
        println!("toolplan v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: toolplan [OPTIONS] <request...>");
        println!();
        println!("Options:");
        println!("  --chat, -c    Answer directly instead of planning tool calls");
        println!("  --json, -j    With --chat, request a JSON answer");
        println!("  --log-json    Write logs to stderr as JSON lines");
        println!("  --help, -h    Show this help");
        println!();
        println!("Environment variables:");
        println!("  OPENROUTER_API_KEY         API key (required)");
        println!("  OPENROUTER_BASE_URL        API base URL");
        println!("  TOOLPLAN_MODEL             Model id (default: deepseek/deepseek-chat:free)");
        println!("  TOOLPLAN_RETRY_DELAY_SECS  Delay between retries (default: 5)");
        println!("  TOOLPLAN_MAX_ATTEMPTS      Attempt bound, 0 = unbounded (default: 20)");
        println!("  TOOLPLAN_TOOL_MODE         auto | prompt | native (default: auto)");
        println!("  TOOLPLAN_TIMEOUT_SECS      HTTP timeout (default: 120)");
        println!("  RUST_LOG                   Log filter (default: info)");
        return Ok(());
    }

    // Logs go to stderr, stdout carries the result
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("toolplan v{}", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::from_env()?;
    let agent = Agent::connect(&config, PURPOSE, builtin::default_registry()).await?;

    if chat_mode {
        let shape = if json_mode { ResponseShape::Json } else { ResponseShape::Text };
        let content = agent.chat(&request, shape).await?;
        println!("{}", content.as_text());
    } else {
        let state = agent.execute(&request).await?;
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    Ok(())
}
