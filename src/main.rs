//! MQTT test client - Main Entry Point
//!
//! Subscribes to one topic filter and prints `<topic> <payload>` for every
//! message until interrupted.

use clap::Parser;
use mqtt_testclient::config::{ClientConfig, Overrides};
use mqtt_testclient::observability::init_default_logging;
use mqtt_testclient::session_span;
use mqtt_testclient::session::{PrintSubscriber, Session, TerminationReason};
use mqtt_testclient::transport::MqttTransport;
use mqtt_testclient::ClientResult;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, Instrument};

const DEFAULT_CONFIG_PATH: &str = "testclient.toml";

/// MQTT test client
#[derive(Parser)]
#[command(name = "testclient")]
#[command(about = "Subscribe to an MQTT topic filter and print every message received")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to ./testclient.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker URL, e.g. mqtt://broker-hostname:1883
    #[arg(long, env = "MQTT_BROKER_URL")]
    broker_url: Option<String>,

    /// Broker host
    #[arg(long)]
    host: Option<String>,

    /// Broker port
    #[arg(long)]
    port: Option<u16>,

    /// Keepalive interval in seconds
    #[arg(long)]
    keepalive: Option<u16>,

    /// Client identifier
    #[arg(long)]
    client_id: Option<String>,

    /// Username sent in the CONNECT packet
    #[arg(short, long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// Password sent in the CONNECT packet
    #[arg(short, long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Topic filter to subscribe to
    #[arg(short, long)]
    topic: Option<String>,

    /// QoS level for the subscription (0, 1 or 2)
    #[arg(long)]
    qos: Option<u8>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            broker_url: self.broker_url.clone(),
            host: self.host.clone(),
            port: self.port,
            keepalive_secs: self.keepalive,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            topic: self.topic.clone(),
            qos: self.qos,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if cli.show_config {
        match toml::to_string_pretty(&config.redacted()) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                error!("Failed to render configuration: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match run_client(config).await {
        Ok(reason) if reason.is_clean() => info!("Application shutdown complete"),
        Ok(reason) => {
            error!("Session ended: {}", reason);
            process::exit(1);
        }
        Err(e) => {
            error!("Client failed: {}", e);
            process::exit(1);
        }
    }
}

fn load_configuration(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            ClientConfig::load_from_file(path)?
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            info!("Loading configuration from: {}", DEFAULT_CONFIG_PATH);
            ClientConfig::load_from_file(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => ClientConfig::default(),
    };

    config.apply(cli.overrides())?;
    Ok(config)
}

async fn run_client(config: ClientConfig) -> ClientResult<TerminationReason> {
    let subscription = config.subscription()?;
    let transport = MqttTransport::connect(&config).await?;
    let handler = PrintSubscriber::stdout(subscription);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                info!("Received {}, shutting down", name);
                let _ = shutdown_tx.send(true);
            }
            // Dropping the sender leaves the session running until the
            // transport ends.
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    });

    let span = session_span!(client_id = %config.client.id, broker = %config.endpoint());
    let mut session = Session::new(transport, handler);
    let reason = session.run(shutdown_rx).instrument(span).await;

    info!(printed = session.handler().printed(), "Session ended: {}", reason);
    Ok(reason)
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}
