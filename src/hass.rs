use std::fmt;

use serde::Deserialize;

pub const DISCOVERY_PREFIX: &str = "homeassistant";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    #[serde(rename = "sensor")]
    Sensor,
    #[serde(rename = "binary_sensor")]
    BinarySensor,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Sensor => "sensor",
            EntityCategory::BinarySensor => "binary_sensor",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "integer")]
    Integer,
    /// Integer payload where `1` means "on" and anything else "off"
    #[serde(rename = "binary_number")]
    BinaryNumber,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    #[serde(rename = "temperature_f")]
    TemperatureF,
    #[serde(rename = "temperature_c")]
    TemperatureC,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "battery")]
    Battery,
}

pub struct SensorMeta {
    pub device_class: &'static str,
    pub icon: &'static str,
    pub unit_of_measurement: Option<&'static str>,
}

const TEMPERATURE_F: SensorMeta = SensorMeta {
    device_class: "temperature",
    icon: "mdi:thermometer",
    unit_of_measurement: Some("°F"),
};

const TEMPERATURE_C: SensorMeta = SensorMeta {
    device_class: "temperature",
    icon: "mdi:thermometer",
    unit_of_measurement: Some("°C"),
};

const HUMIDITY: SensorMeta = SensorMeta {
    device_class: "humidity",
    icon: "mdi:water-percent",
    unit_of_measurement: Some("%"),
};

const BATTERY: SensorMeta = SensorMeta {
    device_class: "battery",
    icon: "mdi:battery",
    unit_of_measurement: None,
};

impl SensorKind {
    pub fn meta(&self) -> &'static SensorMeta {
        match self {
            SensorKind::TemperatureF => &TEMPERATURE_F,
            SensorKind::TemperatureC => &TEMPERATURE_C,
            SensorKind::Humidity => &HUMIDITY,
            SensorKind::Battery => &BATTERY,
        }
    }
}

/// Fully rendered topics of a single entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub config: String,
    pub availability: String,
    pub attributes: String,
    pub state: String,
}

pub fn render_topics(category: EntityCategory, topic_root: &str, property_name: &str) -> Topics {
    let entity_base_topic = format!("{DISCOVERY_PREFIX}/{category}/{topic_root}/{property_name}");
    Topics {
        config: format!("{entity_base_topic}/config"),
        availability: format!("{entity_base_topic}/availability"),
        attributes: format!("{entity_base_topic}/attributes"),
        state: format!("{entity_base_topic}/state"),
    }
}
