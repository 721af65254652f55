use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use snafu::Snafu;

use crate::device::{Device, ValueRange, DEFAULT_OFFLINE_THRESHOLD};
use crate::hass::{EntityCategory, SensorKind, ValueCategory};
use crate::property::Property;

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

#[derive(Debug, PartialEq, Snafu)]
pub enum ConfigError {
    #[snafu(display("No devices configured"))]
    EmptyDevices,

    #[snafu(display("Device '{device_id}' has an empty input topic"))]
    EmptyInputTopic { device_id: String },

    #[snafu(display("Property '{name}' of '{topic_root}' has an empty topic property name"))]
    EmptyTopicPropertyName { topic_root: String, name: String },

    #[snafu(display("Topic root '{topic_root}' is used by more than one device"))]
    DuplicateTopicRoot { topic_root: String },

    #[snafu(display("Property '{name}' is defined twice for '{topic_root}'"))]
    DuplicateProperty { topic_root: String, name: String },

    #[snafu(display("Invalid valid_range for '{device_id}': min {min} is greater than max {max}"))]
    InvalidRange { device_id: String, min: f64, max: f64 },
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Deserialize, Debug)]
pub struct MqttConfig {
    pub address: String,
    pub client_id: Option<String>,
    pub auth: Option<MqttAuth>,
}

#[derive(Deserialize, Debug)]
pub struct MqttAuth {
    pub user: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct DeviceConfig {
    pub sensor_id: String,
    pub device_id: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub ha_topic_name: String,
    pub input_topic: String,
    pub offline_threshold_secs: Option<u64>,
    pub valid_range: Option<RangeConfig>,
    pub properties: Vec<PropertyConfig>,
}

#[derive(Deserialize, Debug)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(Deserialize, Debug)]
pub struct PropertyConfig {
    pub name: String,
    pub topic_property_name: String,
    pub value_type: ValueCategory,
    pub entity_type: EntityCategory,
    pub sensor_type: SensorKind,
    #[serde(default)]
    pub attributes: bool,
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

impl Config {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validates the device definitions and assembles them in configuration order.
    pub fn build_devices(&self) -> Result<Vec<Device>, ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::EmptyDevices);
        }

        let mut topic_roots = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());
        for device_cfg in self.devices.iter() {
            let device = device_cfg.build()?;
            if !topic_roots.insert(device.topic_root().to_string()) {
                return Err(ConfigError::DuplicateTopicRoot {
                    topic_root: device.topic_root().to_string(),
                });
            }
            devices.push(device);
        }
        Ok(devices)
    }
}

impl DeviceConfig {
    pub fn build(&self) -> Result<Device, ConfigError> {
        let mut device = Device::new(
            &self.sensor_id,
            &self.device_id,
            &self.manufacturer,
            &self.model,
            &self.name,
            &self.ha_topic_name,
            &self.input_topic,
        );
        if device.input_topic_prefix().is_empty() {
            return Err(ConfigError::EmptyInputTopic { device_id: self.device_id.clone() });
        }
        if let Some(secs) = self.offline_threshold_secs {
            device = device.with_offline_threshold(Duration::from_secs(secs));
        }
        if let Some(range) = &self.valid_range {
            if range.min > range.max {
                return Err(ConfigError::InvalidRange {
                    device_id: self.device_id.clone(),
                    min: range.min,
                    max: range.max,
                });
            }
            device = device.with_online_check(Box::new(ValueRange { min: range.min, max: range.max }));
        }

        let mut names = HashSet::new();
        for prop_cfg in self.properties.iter() {
            if !names.insert(prop_cfg.name.as_str()) {
                return Err(ConfigError::DuplicateProperty {
                    topic_root: device.topic_root().to_string(),
                    name: prop_cfg.name.clone(),
                });
            }
            if prop_cfg.topic_property_name.is_empty() {
                return Err(ConfigError::EmptyTopicPropertyName {
                    topic_root: device.topic_root().to_string(),
                    name: prop_cfg.name.clone(),
                });
            }
            let property = Property::new(
                device.identity(),
                &prop_cfg.name,
                &prop_cfg.topic_property_name,
                prop_cfg.value_type,
                prop_cfg.entity_type,
                prop_cfg.sensor_type,
                prop_cfg.attributes,
            );
            device.add_property(property);
        }

        log::debug!(
            "Configured '{}' with {} properties, offline after {:?}",
            device.topic_root(),
            device.properties().len(),
            self.offline_threshold_secs.map_or(DEFAULT_OFFLINE_THRESHOLD, Duration::from_secs),
        );
        Ok(device)
    }
}
