//! toolloop CLI binary entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use toolloop::agent::Session;
use toolloop::cli::{render, Cli, Commands, SessionArgs};
use toolloop::config::AgentConfig;
use toolloop::error::{AgentError, RecoverySuggestion};
use toolloop::model::{AnthropicClient, ModelClient};
use toolloop::tools::{builtin, ToolRegistry};
use toolloop::transport::{LocalTransport, ToolTransport};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const DEMO_PROMPTS: [&str; 3] = [
    "Hello! Can you introduce yourself?",
    "What can you help me with?",
    "Explain what MCP (Model Context Protocol) is in simple terms.",
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat => handle_chat(&cli.session).await,
        Commands::Demo => handle_demo(&cli.session).await,
        Commands::Tools => handle_tools(&cli.session).await,
        Commands::Serve => handle_serve().await,
    };

    if let Err(e) = result {
        let message = match e.downcast_ref::<AgentError>() {
            Some(agent_err) => format!("{agent_err}\n  hint: {}", error_hint(agent_err)),
            None => e.to_string(),
        };
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
}

fn error_hint(error: &AgentError) -> &'static str {
    match error.recovery_suggestion() {
        RecoverySuggestion::CheckConfiguration => {
            "check the config file and ANTHROPIC_API_KEY / TOOLLOOP_* variables"
        }
        RecoverySuggestion::RetryWithBackoff => "the model backend is unavailable; try again shortly",
        RecoverySuggestion::Reconnect => "check that the MCP server command starts and speaks stdio",
        RecoverySuggestion::CheckToolImplementation => "a tool definition or handler is faulty",
        RecoverySuggestion::RaiseTurnLimit => "raise max_tool_round_trips",
        RecoverySuggestion::Resubmit => "submit the request again",
        RecoverySuggestion::ContactSupport => "run with RUST_LOG=toolloop=debug for details",
    }
}

fn build_transport(args: &SessionArgs) -> CliResult<Arc<dyn ToolTransport>> {
    match &args.mcp_command {
        #[cfg(feature = "mcp")]
        Some(command_line) => Ok(Arc::new(
            toolloop::transport::McpTransport::from_command_line(command_line)?,
        )),
        #[cfg(not(feature = "mcp"))]
        Some(_) => Err("--mcp-command needs a build with the `mcp` feature".into()),
        None => Ok(Arc::new(LocalTransport::new(builtin_registry()?))),
    }
}

fn builtin_registry() -> CliResult<Arc<ToolRegistry>> {
    let registry = Arc::new(ToolRegistry::new());
    builtin::register_all(&registry)?;
    Ok(registry)
}

/// Resolve config, model and transport, then run `body` in a session that is
/// closed whatever `body` returns.
async fn with_session<F>(args: &SessionArgs, body: F) -> CliResult<()>
where
    F: for<'s> FnOnce(&'s mut Session) -> futures::future::BoxFuture<'s, CliResult<()>>,
{
    let config = args.load_config()?;
    let model: Arc<dyn ModelClient> = Arc::new(AnthropicClient::from_config(&config)?);
    let transport = build_transport(args)?;
    print_banner(&config);

    Session::scoped(config, transport, model, |session| {
        session.set_event_sink(Some(render::progress_sink()));
        body(session)
    })
    .await?
}

fn print_banner(config: &AgentConfig) {
    println!("toolloop");
    println!("   Model: {}", config.model);
    println!("   Max tokens: {}", config.max_tokens);
    println!("   Temperature: {}", config.temperature);
}

async fn handle_tools(args: &SessionArgs) -> CliResult<()> {
    let transport = build_transport(args)?;
    transport.open().await?;
    let tools = transport.discover().await;
    transport.close().await?;
    println!("{}", render::tool_list(&tools?));
    Ok(())
}

#[cfg(feature = "mcp")]
async fn handle_serve() -> CliResult<()> {
    toolloop::transport::McpToolServer::new(builtin_registry()?)
        .serve_stdio()
        .await?;
    Ok(())
}

#[cfg(not(feature = "mcp"))]
async fn handle_serve() -> CliResult<()> {
    Err("`serve` needs a build with the `mcp` feature".into())
}

async fn handle_demo(args: &SessionArgs) -> CliResult<()> {
    with_session(args, |session| run_demo(session).boxed()).await
}

async fn run_demo(session: &mut Session) -> CliResult<()> {
    println!("\n{}", render::tool_list(session.tools()));

    for (i, prompt) in DEMO_PROMPTS.iter().enumerate() {
        println!("\nDemo query {}: {prompt}", i + 1);
        match session.submit(*prompt).await {
            Ok(answer) => println!("Agent: {}", answer.text),
            Err(failure) => eprintln!("Error: {failure}"),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}

async fn handle_chat(args: &SessionArgs) -> CliResult<()> {
    with_session(args, |session| run_chat(session).boxed()).await
}

async fn run_chat(session: &mut Session) -> CliResult<()> {
    println!("Type 'quit' or 'exit' to end, 'clear' to reset history, 'tools' to list tools.");
    println!("Ctrl+C cancels the running turn.");
    println!("\n{}", render::tool_list(session.tools()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => {
                session.clear_history();
                println!("Conversation history cleared.");
                continue;
            }
            "tools" => {
                let tools = session.refresh_tools().await?;
                println!("{}", render::tool_list(tools));
                continue;
            }
            _ => {}
        }

        // The token exists before the watcher starts, so an early Ctrl+C still
        // reaches this turn.
        let interrupt = CancellationToken::new();
        let watcher = {
            let interrupt = interrupt.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            })
        };
        let result = session.submit_with_cancel(input, interrupt).await;
        watcher.abort();

        match result {
            Ok(answer) => println!("\nAgent: {}", answer.text),
            Err(failure) if failure.is_cancelled() => println!("\nTurn cancelled."),
            Err(failure) => eprintln!("\nError: {failure}"),
        }
    }

    println!("Goodbye!");
    Ok(())
}
