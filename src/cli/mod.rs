//! CLI module for Pulse
//!
//! # Commands
//!
//! - `serve` - Run the hub: WebSocket endpoint, telemetry scheduler, liveness sweep
//! - `watch` - Stream a hub's telemetry to the terminal
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! pulse serve -c pulse.toml
//! pulse watch --channel metrics --channel cluster-status
//! pulse completions zsh > ~/.zfunc/_pulse
//! ```

pub mod completions;
pub mod config;
pub mod serve;
pub mod watch;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Pulse - real-time telemetry hub
#[derive(Parser, Debug)]
#[command(
    name = "pulse",
    version,
    about = "Real-time telemetry distribution hub"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the hub
    Serve(ServeArgs),
    /// Print a hub's telemetry stream
    Watch(WatchArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pulse.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "PULSE_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "PULSE_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PULSE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pulse.toml")]
    pub config: PathBuf,

    /// Hub WebSocket URL
    #[arg(short, long, env = "PULSE_CLIENT_URL")]
    pub url: Option<String>,

    /// Channel to subscribe to (repeatable)
    #[arg(long = "channel", default_values_t = vec!["metrics".to_string()])]
    pub channels: Vec<String>,

    /// Print each message as raw JSON
    #[arg(long)]
    pub json: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "pulse.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
