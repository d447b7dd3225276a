//! Kalshi streaming CLI
//!
//! Streams live exchange updates to the terminal. Data goes to stdout, logs
//! go to stderr.

mod render;
mod settings;

use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kalshi_stream::{Channel, KalshiError, Message, Params, StreamClient};

use crate::render::OutputFormat;
use crate::settings::{EnvSettings, FileSettings, Overrides, Settings};

#[derive(Parser)]
#[command(name = "kalshi", version, about = "Kalshi real-time market data")]
struct Cli {
    /// Use the demo exchange
    #[arg(long, global = true)]
    demo: bool,

    /// API key id (or set KALSHI_API_KEY_ID)
    #[arg(long, global = true)]
    api_key_id: Option<String>,

    /// Path to the API private key (or set KALSHI_PRIVATE_KEY_FILE)
    #[arg(long, global = true)]
    private_key_file: Option<PathBuf>,

    /// Keepalive ping interval in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    ping_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the streaming channels
    Channels,
    /// Stream live updates until Ctrl-C
    Stream {
        /// Channel to subscribe to (repeatable)
        #[arg(long = "channel", short = 'c', required = true)]
        channels: Vec<Channel>,

        /// Restrict to these market tickers (repeatable)
        #[arg(long = "market", short = 'm')]
        markets: Vec<String>,

        /// Print raw JSON frames instead of formatted lines
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key_id: self.api_key_id.clone(),
            private_key_file: self.private_key_file.clone(),
            demo: self.demo,
            ping_interval_secs: self.ping_interval_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kalshi_stream=info")),
        )
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Command::Channels => {
            print_channels();
            Ok(())
        }
        Command::Stream {
            channels,
            markets,
            json,
        } => {
            let settings = Settings::resolve(&overrides, &EnvSettings::from_env()?, &FileSettings::load()?)?;
            let format = if json { OutputFormat::Json } else { OutputFormat::Text };
            stream(settings, channels, markets, format).await
        }
    }
}

fn print_channels() {
    println!("{:<22} ACCESS", "CHANNEL");
    for channel in Channel::ALL {
        let access = if channel.requires_auth() { "private" } else { "public" };
        println!("{:<22} {}", channel.as_str(), access);
    }
}

async fn stream(
    settings: Settings,
    mut channels: Vec<Channel>,
    markets: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    channels.sort();
    channels.dedup();

    let client = StreamClient::new(settings.client_options()?);
    for &channel in &channels {
        client.register_handler(channel, move |message: &Message| -> anyhow::Result<()> {
            let line = render::render(channel, message, format);
            match format {
                OutputFormat::Json => println!("{}", line),
                OutputFormat::Text => println!("{} {}", Local::now().format("%H:%M:%S"), line),
            }
            Ok(())
        });
    }
    client.on_error(|err| warn!("Stream error: {}", err));
    client.on_reconnect(|| info!("Reconnected, subscriptions restored"));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal.cancel();
        }
    });

    info!("Connecting to the {} exchange", settings.environment);
    match client.connect_with_cancel(&shutdown).await {
        Ok(()) => {}
        Err(KalshiError::Cancelled) => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let mut params = Params::new();
    if !markets.is_empty() {
        params.insert("market_tickers".to_string(), serde_json::json!(markets));
    }

    for channel in channels {
        let reply = tokio::select! {
            _ = shutdown.cancelled() => break,
            reply = client.subscribe_confirmed(channel, params.clone()) => reply,
        };
        match reply {
            Ok(reply) => info!("Subscribed to {} (sid: {:?})", channel, reply.sid),
            Err(e @ KalshiError::Server { .. }) => warn!("Subscribe to {} rejected: {}", channel, e),
            Err(e) => {
                client.close().await;
                return Err(e.into());
            }
        }
    }

    shutdown.cancelled().await;
    client.close().await;
    Ok(())
}
