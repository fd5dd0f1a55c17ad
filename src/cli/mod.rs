//! Command-line interface for toolloop.

pub mod render;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AgentConfig;
use crate::error::Result;

/// Conversational agent with tool calling
#[derive(Parser, Debug)]
#[command(name = "toolloop", version, about = "Chat with a model that can call tools")]
pub struct Cli {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat session
    Chat,
    /// List tools, then run a few canned prompts
    Demo,
    /// List the available tools
    Tools,
    /// Serve the built-in tools to MCP clients over stdio
    Serve,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Config file (TOML); defaults to the per-user config path when it exists
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve tools from an MCP server started with this command line
    #[arg(long, global = true)]
    pub mcp_command: Option<String>,

    /// Model id
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long, global = true)]
    pub system: Option<String>,

    /// Temperature (0.0 - 1.0)
    #[arg(short, long, global = true)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,
}

impl SessionArgs {
    /// Resolve the effective config: file, then environment, then flags.
    pub fn load_config(&self) -> Result<AgentConfig> {
        let path = self
            .config
            .clone()
            .or_else(|| AgentConfig::default_path().filter(|p| p.exists()));
        let config = match path {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };
        Ok(self.apply(config.with_env_overrides()?))
    }

    /// Overlay command-line flags on `config`.
    pub fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = Some(system.clone());
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["toolloop", "chat"]).unwrap();

        assert!(matches!(cli.command, Commands::Chat));
        assert!(cli.session.mcp_command.is_none());
        assert!(cli.session.model.is_none());
    }

    #[test]
    fn global_options_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "toolloop",
            "demo",
            "--mcp-command",
            "python server.py",
            "-t",
            "0.2",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Demo));
        assert_eq!(cli.session.mcp_command.as_deref(), Some("python server.py"));
        assert_eq!(cli.session.temperature, Some(0.2));
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["toolloop", "serve"]).unwrap();

        assert!(matches!(cli.command, Commands::Serve));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["toolloop"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let args = SessionArgs {
            model: Some("claude-test".into()),
            max_tokens: Some(128),
            ..SessionArgs::default()
        };

        let config = args.apply(AgentConfig::default());

        assert_eq!(config.model, "claude-test");
        assert_eq!(config.max_tokens, 128);
        assert_eq!(config.max_retries, AgentConfig::default().max_retries);
    }
}
