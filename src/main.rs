use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};

use clap::Parser;

use paho_mqtt as mqtt;
use snafu::{Whatever, whatever, ResultExt};

use sensor2hass::config::{Config, MqttConfig};
use sensor2hass::{Bridge, Message, MessageSink};

const DEFAULT_CLIENT_ID: &str = "sensor2hass";
const MQTT_QOS: i32 = 1;
const MQTT_RETRY_DELAY_SECS: u64 = 10;
const MQTT_KEEP_ALIVE_SECS: u64 = 60;

#[derive(Parser, Debug)]
struct Args {
    config: PathBuf,
}

struct MqttSink<'a> {
    client: &'a mqtt::Client,
}

impl<'a> MessageSink for MqttSink<'a> {
    type Error = mqtt::Error;

    fn publish(&mut self, message: &Message) -> Result<(), mqtt::Error> {
        let msg = if message.retain {
            mqtt::Message::new_retained(message.topic.as_str(), message.payload.as_str(), MQTT_QOS)
        } else {
            mqtt::Message::new(message.topic.as_str(), message.payload.as_str(), MQTT_QOS)
        };
        self.client.publish(msg)
    }
}

fn main() -> Result<(), Whatever> {
    env_logger::init();

    let args = Args::parse();

    let config_file = File::open(args.config)
        .with_whatever_context(|e| format!("Cannot open config file: {e}"))?;
    let config_reader = BufReader::new(config_file);
    let config: Config = serde_yaml::from_reader(config_reader)
        .with_whatever_context(|e| format!("Error when parsing config file: {e}"))?;
    let devices = config.build_devices()
        .with_whatever_context(|e| format!("Invalid device configuration: {e}"))?;
    if config.check_interval_secs == 0 {
        whatever!("check_interval_secs must be greater than zero");
    }
    log::info!("Loaded {} devices", devices.len());

    let client = create_mqtt_client(&config.mqtt)?;
    let rx = client.start_consuming();
    let mut bridge = Bridge::new(devices, MqttSink { client: &client });
    let input_topics = bridge.input_topics();
    connect(&client, &config.mqtt, &input_topics);

    let check_interval = config.check_interval();
    let mut next_check = Instant::now();
    loop {
        let now = Instant::now();
        if now >= next_check {
            let published = bridge.tick(now);
            if published > 0 {
                log::info!("Announced {published} offline messages");
            }
            next_check = now + check_interval;
        }

        match rx.recv_timeout(next_check.saturating_duration_since(Instant::now())) {
            Ok(Some(msg)) => {
                log::trace!("Received message on {}", msg.topic());
                bridge.on_message(msg.topic(), msg.payload(), Instant::now());
            }
            Ok(None) => {
                log::warn!("Lost connection to mqtt server");
                connect(&client, &config.mqtt, &input_topics);
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => whatever!("Mqtt consumer channel closed: {e}"),
        }
    }
}

fn create_mqtt_client(cfg: &MqttConfig) -> Result<mqtt::Client, Whatever> {
    let create_opts = mqtt::CreateOptionsBuilder::new()
        .server_uri(format!("tcp://{}", cfg.address))
        .client_id(cfg.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID))
        .finalize();
    mqtt::Client::new(create_opts)
        .with_whatever_context(|e| format!("Error creating mqtt client: {e}"))
}

/// Connects (or reconnects) and subscribes to the device input topics, retrying until it succeeds.
fn connect(client: &mqtt::Client, cfg: &MqttConfig, input_topics: &[String]) {
    let mut conn_opts_builder = mqtt::ConnectOptionsBuilder::new();
    conn_opts_builder
        .keep_alive_interval(Duration::from_secs(MQTT_KEEP_ALIVE_SECS))
        .clean_session(true);
    if let Some(auth) = &cfg.auth {
        conn_opts_builder
            .user_name(&auth.user)
            .password(&auth.password);
    }
    let conn_opts = conn_opts_builder.finalize();
    let qos = vec![MQTT_QOS; input_topics.len()];

    loop {
        if let Err(e) = client.connect(conn_opts.clone()) {
            log::warn!("Unable to connect to mqtt server. Waiting:\n\t{e}");
            sleep(Duration::from_secs(MQTT_RETRY_DELAY_SECS));
            continue;
        }
        match client.subscribe_many(input_topics, &qos) {
            Ok(_) => {
                log::info!("Connected to {}, subscribed to {input_topics:?}", cfg.address);
                return;
            }
            Err(e) => {
                log::warn!("Unable to subscribe to input topics. Waiting:\n\t{e}");
                sleep(Duration::from_secs(MQTT_RETRY_DELAY_SECS));
            }
        }
    }
}
