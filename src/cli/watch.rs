//! Watch command implementation

use crate::cli::WatchArgs;
use crate::client::{
    ClientError, ClientHandler, IncomingMessage, ReconnectPolicy, ReconnectingClient,
};
use crate::config::{LoggingConfig, PulseConfig};
use crate::protocol::EnvelopeType;
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::Notify;

/// Resolve the client settings: file, then environment, then `--url`.
pub fn load_watch_config(args: &WatchArgs) -> Result<PulseConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        PulseConfig::load(Some(&args.config))?
    } else {
        PulseConfig::default()
    };
    config = config.with_env_overrides();

    if let Some(ref url) = args.url {
        config.client.url = url.clone();
    }
    config.logging.level = args.log_level.clone();

    Ok(config)
}

/// Render one inbound frame as a terminal line.
pub fn format_message(message: &IncomingMessage, json: bool) -> String {
    if json {
        return match message {
            IncomingMessage::Json(value) => value.to_string(),
            IncomingMessage::Raw(text) => text.clone(),
        };
    }

    let Some(envelope) = message.envelope() else {
        return match message {
            IncomingMessage::Json(value) => format!("{} {}", "?".dimmed(), value),
            IncomingMessage::Raw(text) => format!("{} {}", "raw".dimmed(), text),
        };
    };

    let time = envelope.timestamp.format("%H:%M:%S%.3f").to_string();
    let kind = match &envelope.envelope_type {
        EnvelopeType::Error => envelope.envelope_type.as_str().red().to_string(),
        EnvelopeType::MetricsUpdate
        | EnvelopeType::ContainerStatusUpdate
        | EnvelopeType::ClusterStatusUpdate
        | EnvelopeType::ModelStatusUpdate => envelope.envelope_type.as_str().cyan().to_string(),
        other => other.as_str().bold().to_string(),
    };

    format!("{} {} {}", time.dimmed(), kind, envelope.data)
}

/// Prints frames to stdout and lifecycle events to stderr.
struct PrintHandler {
    json: bool,
    gave_up: Arc<Notify>,
}

impl ClientHandler for PrintHandler {
    fn on_open(&self) {
        eprintln!("{}", "● connected".green());
    }

    fn on_message(&self, message: IncomingMessage) {
        println!("{}", format_message(&message, self.json));
    }

    fn on_close(&self) {
        eprintln!("{}", "○ disconnected".yellow());
    }

    fn on_error(&self, error: &ClientError) {
        eprintln!("{} {}", "✗".red(), error);
        if matches!(error, ClientError::RetriesExhausted { .. }) {
            self.gave_up.notify_one();
        }
    }
}

/// Main watch command handler
///
/// Runs until Ctrl+C, or until the client exhausts its reconnect attempts.
pub async fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_watch_config(&args)?;
    config.validate()?;

    init_watch_tracing(&config.logging);

    let gave_up = Arc::new(Notify::new());
    let handler = Arc::new(PrintHandler {
        json: args.json,
        gave_up: Arc::clone(&gave_up),
    });
    let client = ReconnectingClient::websocket(
        config.client.url.clone(),
        handler,
        ReconnectPolicy::from_config(&config.client),
    );

    eprintln!("Watching {} ({})", config.client.url, args.channels.join(", "));
    client.connect().await;
    for channel in &args.channels {
        client.subscribe(channel);
    }

    let result: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
        _ = gave_up.notified() => Err(format!(
            "Gave up on {} after {} reconnect attempts",
            config.client.url, config.client.max_reconnect_attempts
        )
        .into()),
    };

    client.disconnect();
    result
}

/// Watch output owns stdout, so logs only go to stderr and failures to install are ignored.
fn init_watch_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(crate::logging::build_filter_directives(config))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
