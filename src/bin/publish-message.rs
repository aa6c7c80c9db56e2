//! MQTT message publishing utility
//!
//! Publishes a single message so a running `testclient` has something to
//! print.
//!
//! ## Usage
//!
//! ```bash
//! # What the visitor counter would publish
//! publish-message --topic /vvm/visitorcounter/lobby --message 42
//!
//! # Against another broker, at QoS 1, retained
//! publish-message --broker-url mqtt://broker-hostname:1883 \
//!   --topic /vvm/visitorcounter/lobby --message 42 --qos 1 --retain
//! ```

use clap::Parser;
use mqtt_testclient::config::{parse_broker_url, qos_from_level, DEFAULT_MAX_PACKET_SIZE};
use mqtt_testclient::observability::init_default_logging;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(
    name = "publish-message",
    about = "Publish one MQTT message for the test client to receive"
)]
struct Args {
    /// Topic to publish to
    #[arg(short, long, required = true)]
    topic: String,

    /// Message payload, sent verbatim
    #[arg(short, long, required = true)]
    message: String,

    /// QoS level (0, 1 or 2)
    #[arg(long, default_value_t = 0)]
    qos: u8,

    /// Ask the broker to retain the message
    #[arg(long)]
    retain: bool,

    /// MQTT broker URL
    #[arg(long, env = "MQTT_BROKER_URL", default_value = "mqtt://localhost:1883")]
    broker_url: String,

    /// Username sent in the CONNECT packet
    #[arg(short, long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// Password sent in the CONNECT packet
    #[arg(short, long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Seconds to wait for the broker before giving up
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

/// Unique per process and per millisecond, so concurrent publishers never
/// take over each other's broker session
fn publisher_client_id(pid: u32, since_epoch: Duration) -> String {
    format!("publish-message-{pid}-{}", since_epoch.as_millis())
}

/// Wait until the publish has left the client (QoS 0) or been acknowledged
async fn drive_until_published(
    event_loop: &mut EventLoop,
    qos: QoS,
) -> Result<(), rumqttc::ConnectionError> {
    loop {
        let event = event_loop.poll().await?;
        debug!("MQTT event: {:?}", event);
        match (qos, event) {
            (QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
            (QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(_))) => return Ok(()),
            (QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(_))) => return Ok(()),
            _ => {}
        }
    }
}

async fn publish(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (host, port) = parse_broker_url(&args.broker_url)?;
    let qos = qos_from_level(args.qos)?;

    let client_id = publisher_client_id(
        process::id(),
        SystemTime::now().duration_since(UNIX_EPOCH)?,
    );
    let mut mqtt_options = MqttOptions::new(client_id, host.clone(), port);
    mqtt_options.set_keep_alive(Duration::from_secs(60));
    mqtt_options.set_max_packet_size(DEFAULT_MAX_PACKET_SIZE, DEFAULT_MAX_PACKET_SIZE);
    if let Some(username) = args.username {
        mqtt_options.set_credentials(username, args.password.unwrap_or_default());
    }

    let (client, mut event_loop) = AsyncClient::new(mqtt_options, 10);

    info!(broker = %format!("{host}:{port}"), topic = %args.topic, "Publishing");
    client
        .publish(args.topic.clone(), qos, args.retain, args.message.into_bytes())
        .await?;

    tokio::time::timeout(
        Duration::from_secs(args.timeout),
        drive_until_published(&mut event_loop, qos),
    )
    .await
    .map_err(|_| format!("broker did not confirm the publish within {}s", args.timeout))??;

    client.disconnect().await?;
    // Flush the DISCONNECT; the broker closing the socket ends the loop
    let _ = tokio::time::timeout(Duration::from_secs(1), event_loop.poll()).await;

    info!(topic = %args.topic, "Message published");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_default_logging(0);

    if let Err(e) = publish(args).await {
        error!("Failed to publish message: {}", e);
        process::exit(1);
    }
}
