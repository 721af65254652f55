use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::str::{self, Utf8Error};

use serde_json::json;
use snafu::Snafu;
use snafu::prelude::*;

use crate::device::Identity;
use crate::hass::{render_topics, EntityCategory, SensorKind, Topics, ValueCategory};

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const DISCOVERY_QOS: u8 = 1;

#[derive(Debug, PartialEq, Snafu)]
pub enum DecodeError {
    #[snafu(display("Expected UTF-8 payload: {source}"))]
    ExpectedUtf8 { source: Utf8Error },

    #[snafu(display("Expected float value, got '{payload}': {source}"))]
    ExpectedFloat { payload: String, source: ParseFloatError },

    #[snafu(display("Expected integer value, got '{payload}': {source}"))]
    ExpectedInteger { payload: String, source: ParseIntError },
}

/// Decoded value of a property
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Float(f64),
    Integer(i64),
    Switch(bool),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Float(v) => write!(f, "{v}"),
            State::Integer(v) => write!(f, "{v}"),
            State::Switch(true) => f.write_str("on"),
            State::Switch(false) => f.write_str("off"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl Message {
    fn new(topic: &str, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.into(),
            retain: false,
        }
    }

    fn new_retained(topic: &str, payload: impl Into<String>) -> Self {
        Self {
            retain: true,
            ..Self::new(topic, payload)
        }
    }
}

/// A single measured attribute of a device, announced to Home Assistant as one entity.
#[derive(Debug)]
pub struct Property {
    name: String,
    topic_property_name: String,
    value_category: ValueCategory,
    entity_category: EntityCategory,
    topics: Topics,
    with_attributes: bool,
    config_payload: String,
}

impl Property {
    pub fn new(
        identity: &Identity,
        name: &str,
        topic_property_name: &str,
        value_category: ValueCategory,
        entity_category: EntityCategory,
        sensor_kind: SensorKind,
        with_attributes: bool,
    ) -> Self {
        let topics = render_topics(entity_category, &identity.topic_root, name);
        let meta = sensor_kind.meta();

        let mut discovery = json!({
            "availability_topic": topics.availability,
            "state_topic": topics.state,
            "unique_id": format!("{}_{}", identity.topic_root, name),
            "name": name,
            "qos": DISCOVERY_QOS,
            "icon": meta.icon,
            "device_class": meta.device_class,
            "device": {
                "identifiers": [identity.device_id],
                "manufacturer": identity.manufacturer,
                "model": identity.model,
                "name": identity.name,
            },
        });
        if with_attributes {
            discovery["json_attributes_topic"] = json!(topics.attributes);
        }
        if let Some(unit) = meta.unit_of_measurement {
            discovery["unit_of_measurement"] = json!(unit);
        }

        Self {
            name: name.to_string(),
            topic_property_name: topic_property_name.to_string(),
            value_category,
            entity_category,
            topics,
            with_attributes,
            config_payload: discovery.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_category(&self) -> EntityCategory {
        self.entity_category
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// JSON discovery document published to the config topic
    pub fn config_payload(&self) -> &str {
        &self.config_payload
    }

    /// Loose containment test, kept compatible with rtl_433 style topics
    pub fn matches(&self, topic: &str) -> bool {
        topic.contains(&self.topic_property_name)
    }

    pub fn decode(&self, payload: &[u8]) -> Result<State, DecodeError> {
        let payload = str::from_utf8(payload)
            .context(ExpectedUtf8Snafu)?
            .trim();
        let state = match self.value_category {
            ValueCategory::Float => State::Float(
                payload.parse::<f64>()
                    .context(ExpectedFloatSnafu { payload })?
            ),
            ValueCategory::Integer => State::Integer(
                payload.parse::<i64>()
                    .context(ExpectedIntegerSnafu { payload })?
            ),
            ValueCategory::BinaryNumber => State::Switch(
                payload.parse::<i64>()
                    .context(ExpectedIntegerSnafu { payload })? == 1
            ),
        };
        Ok(state)
    }

    /// Config, availability "online", state and, when given, attributes.
    pub fn online_messages(&self, state: &State, attributes: Option<&str>) -> Vec<Message> {
        let mut messages = self.base_messages(PAYLOAD_ONLINE);
        messages.push(Message::new(&self.topics.state, state.to_string()));
        if let Some(attributes) = attributes {
            if !self.with_attributes {
                log::debug!("Publishing attributes for '{}' which does not advertise them", self.name);
            }
            messages.push(Message::new(&self.topics.attributes, attributes));
        }
        messages
    }

    /// Config and availability "offline".
    pub fn offline_messages(&self) -> Vec<Message> {
        self.base_messages(PAYLOAD_OFFLINE)
    }

    fn base_messages(&self, availability: &str) -> Vec<Message> {
        vec![
            Message::new_retained(&self.topics.config, self.config_payload.clone()),
            Message::new(&self.topics.availability, availability),
        ]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::device::Identity;
    use crate::hass::{EntityCategory, SensorKind, ValueCategory};
    use super::{DecodeError, Message, Property, State};

    fn identity() -> Identity {
        Identity {
            device_id: "acurite-5n1-1234".to_string(),
            manufacturer: "Acurite".to_string(),
            model: "5n1".to_string(),
            name: "Backyard weather".to_string(),
            topic_root: "weather_1234".to_string(),
        }
    }

    fn property(value_category: ValueCategory) -> Property {
        Property::new(
            &identity(),
            "temperature",
            "temperature_C",
            value_category,
            EntityCategory::Sensor,
            SensorKind::TemperatureC,
            false,
        )
    }

    #[test]
    fn test_discovery_document() {
        let prop = property(ValueCategory::Float);
        let doc: Value = serde_json::from_str(prop.config_payload()).unwrap();
        assert_eq!(doc["availability_topic"], "homeassistant/sensor/weather_1234/temperature/availability");
        assert_eq!(doc["state_topic"], "homeassistant/sensor/weather_1234/temperature/state");
        assert_eq!(doc["unique_id"], "weather_1234_temperature");
        assert_eq!(doc["name"], "temperature");
        assert_eq!(doc["qos"], 1);
        assert_eq!(doc["icon"], "mdi:thermometer");
        assert_eq!(doc["device_class"], "temperature");
        assert_eq!(doc["unit_of_measurement"], "°C");
        assert_eq!(doc["device"]["identifiers"][0], "acurite-5n1-1234");
        assert_eq!(doc["device"]["manufacturer"], "Acurite");
        assert_eq!(doc["device"]["model"], "5n1");
        assert_eq!(doc["device"]["name"], "Backyard weather");
        assert!(doc.get("json_attributes_topic").is_none());
    }

    #[test]
    fn test_discovery_document_optional_fields() {
        let prop = Property::new(
            &identity(),
            "battery",
            "battery_ok",
            ValueCategory::BinaryNumber,
            EntityCategory::BinarySensor,
            SensorKind::Battery,
            true,
        );
        let doc: Value = serde_json::from_str(prop.config_payload()).unwrap();
        assert!(doc.get("unit_of_measurement").is_none());
        assert_eq!(doc["json_attributes_topic"], "homeassistant/binary_sensor/weather_1234/battery/attributes");
    }

    #[test]
    fn test_decode_float() {
        assert_eq!(property(ValueCategory::Float).decode(b"21.5").unwrap(), State::Float(21.5));
        assert_eq!(property(ValueCategory::Float).decode(b" -3.25\n").unwrap(), State::Float(-3.25));
    }

    #[test]
    fn test_decode_integer() {
        assert_eq!(property(ValueCategory::Integer).decode(b"87").unwrap(), State::Integer(87));
    }

    #[test]
    fn test_decode_binary_number() {
        let prop = property(ValueCategory::BinaryNumber);
        assert_eq!(prop.decode(b"1").unwrap(), State::Switch(true));
        assert_eq!(prop.decode(b"0").unwrap(), State::Switch(false));
        assert_eq!(prop.decode(b"2").unwrap(), State::Switch(false));
        assert_eq!(State::Switch(true).to_string(), "on");
        assert_eq!(State::Switch(false).to_string(), "off");
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(
            property(ValueCategory::Float).decode(b"warm").unwrap_err(),
            DecodeError::ExpectedFloat {
                payload: "warm".to_string(),
                source: "warm".parse::<f64>().unwrap_err(),
            }
        );
        assert_eq!(
            property(ValueCategory::Integer).decode(b"1.5").unwrap_err(),
            DecodeError::ExpectedInteger {
                payload: "1.5".to_string(),
                source: "1.5".parse::<i64>().unwrap_err(),
            }
        );
        assert!(property(ValueCategory::BinaryNumber).decode(b"on").is_err());
        assert!(matches!(
            property(ValueCategory::Float).decode(&[0xff, 0xfe]).unwrap_err(),
            DecodeError::ExpectedUtf8 { .. }
        ));
    }

    #[test]
    fn test_matches() {
        let prop = property(ValueCategory::Float);
        assert!(prop.matches("temperature_C"));
        assert!(prop.matches("rtl_433/Acurite-5n1/1234/temperature_C"));
        assert!(!prop.matches("rtl_433/Acurite-5n1/1234/humidity"));
    }

    #[test]
    fn test_offline_messages() {
        let prop = property(ValueCategory::Float);
        assert_eq!(
            prop.offline_messages(),
            vec![
                Message {
                    topic: "homeassistant/sensor/weather_1234/temperature/config".to_string(),
                    payload: prop.config_payload().to_string(),
                    retain: true,
                },
                Message {
                    topic: "homeassistant/sensor/weather_1234/temperature/availability".to_string(),
                    payload: "offline".to_string(),
                    retain: false,
                },
            ]
        );
    }

    #[test]
    fn test_online_messages() {
        let prop = property(ValueCategory::Float);
        let messages = prop.online_messages(&State::Float(21.5), None);
        let pairs: Vec<_> = messages.iter().map(|m| (m.topic.as_str(), m.payload.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("homeassistant/sensor/weather_1234/temperature/config", prop.config_payload()),
                ("homeassistant/sensor/weather_1234/temperature/availability", "online"),
                ("homeassistant/sensor/weather_1234/temperature/state", "21.5"),
            ]
        );
    }

    #[test]
    fn test_online_messages_with_attributes() {
        let prop = property(ValueCategory::Integer);
        let messages = prop.online_messages(&State::Integer(3), Some(r#"{"rssi":-71}"#));
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].topic, "homeassistant/sensor/weather_1234/temperature/attributes");
        assert_eq!(messages[3].payload, r#"{"rssi":-71}"#);
    }
}
