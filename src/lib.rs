//! toolloop: a conversational agent turn loop with pluggable tool transports.
//!
//! A [`Session`](agent::Session) sends the conversation to a
//! [`ModelClient`](model::ModelClient); whenever the model asks for tools the
//! calls go through a [`ToolTransport`](transport::ToolTransport) and the
//! results are fed back until the model answers.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolloop::prelude::*;
//!
//! # async fn example() -> toolloop::error::Result<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! toolloop::tools::builtin::register_all(&registry)?;
//!
//! let config = AgentConfig::from_env()?;
//! let model = Arc::new(AnthropicClient::from_config(&config)?);
//! let transport = Arc::new(LocalTransport::new(registry));
//!
//! let mut session = Session::start(config, transport, model).await?;
//! match session.submit("What OS am I on?").await {
//!     Ok(answer) => println!("{}", answer.text),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
