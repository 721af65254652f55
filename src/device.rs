use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::property::{Message, Property, State};

pub const DEFAULT_OFFLINE_THRESHOLD: Duration = Duration::from_secs(2 * 60 + 30);

/// Device metadata shared by every entity of the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub device_id: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub topic_root: String,
}

/// Decides whether a successfully decoded value means the device is really online.
pub trait OnlineCheck: Debug + Send {
    fn payload_online_check(&self, _state: &State) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct AcceptAll;

impl OnlineCheck for AcceptAll {}

/// Rejects numeric readings outside of `min..=max`.
/// Some sensors report garbage values instead of going silent when their battery dies.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl OnlineCheck for ValueRange {
    fn payload_online_check(&self, state: &State) -> bool {
        let value = match state {
            State::Float(v) => *v,
            State::Integer(v) => *v as f64,
            State::Switch(_) => return true,
        };
        (self.min..=self.max).contains(&value)
    }
}

#[derive(Debug)]
pub struct Device {
    identity: Identity,
    input_topic: String,
    input_topic_prefix: String,
    offline_threshold: Duration,
    last_seen: Option<Instant>,
    properties: Vec<Property>,
    online_check: Box<dyn OnlineCheck>,
}

impl Device {
    pub fn new(
        sensor_id: &str,
        device_id: &str,
        manufacturer: &str,
        model: &str,
        name: &str,
        ha_topic_name: &str,
        input_topic: &str,
    ) -> Self {
        let input_topic_prefix = input_topic
            .split_once('#')
            .map_or(input_topic, |(prefix, _)| prefix);
        Self {
            identity: Identity {
                device_id: device_id.to_string(),
                manufacturer: manufacturer.to_string(),
                model: model.to_string(),
                name: name.to_string(),
                topic_root: format!("{ha_topic_name}_{sensor_id}"),
            },
            input_topic: input_topic.to_string(),
            input_topic_prefix: input_topic_prefix.to_string(),
            offline_threshold: DEFAULT_OFFLINE_THRESHOLD,
            last_seen: None,
            properties: Vec::new(),
            online_check: Box::new(AcceptAll),
        }
    }

    pub fn with_offline_threshold(mut self, offline_threshold: Duration) -> Self {
        self.offline_threshold = offline_threshold;
        self
    }

    pub fn with_online_check(mut self, online_check: Box<dyn OnlineCheck>) -> Self {
        self.online_check = online_check;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn topic_root(&self) -> &str {
        &self.identity.topic_root
    }

    /// Subscription filter as configured, wildcard included
    pub fn input_topic(&self) -> &str {
        &self.input_topic
    }

    pub fn input_topic_prefix(&self) -> &str {
        &self.input_topic_prefix
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn accepts(&self, topic: &str) -> bool {
        topic.contains(&self.input_topic_prefix)
    }

    pub fn payload_online_check(&self, state: &State) -> bool {
        self.online_check.payload_online_check(state)
    }

    /// Translates an inbound message into Home Assistant messages.
    ///
    /// One inbound topic is expected to carry exactly one property. When several
    /// properties match, only the batch of the last one is returned.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8], now: Instant) -> Vec<Message> {
        if !self.accepts(topic) {
            return Vec::new();
        }

        let mut messages = Vec::new();
        let mut matched: Option<&str> = None;
        for property in self.properties.iter().filter(|p| p.matches(topic)) {
            if let Some(previous) = matched {
                log::warn!(
                    "Topic '{topic}' matches both '{previous}' and '{}' of '{}', keeping the latter",
                    property.name(),
                    self.identity.topic_root,
                );
            }
            matched = Some(property.name());

            messages = match property.decode(payload) {
                Ok(state) if self.payload_online_check(&state) => {
                    log::debug!("Decoded '{}' of '{}': {state}", property.name(), self.identity.topic_root);
                    property.online_messages(&state, None)
                }
                Ok(state) => {
                    log::warn!(
                        "Rejected value {state} for '{}' of '{}'",
                        property.name(),
                        self.identity.topic_root,
                    );
                    property.offline_messages()
                }
                Err(e) => {
                    log::warn!("Cannot decode payload on '{topic}': {e}");
                    property.offline_messages()
                }
            };
        }

        self.last_seen = Some(now);
        messages
    }

    pub fn is_offline(&self, now: Instant) -> bool {
        match self.last_seen {
            None => true,
            Some(last_seen) => now.saturating_duration_since(last_seen) > self.offline_threshold,
        }
    }

    /// Offline batch of every property while the device is silent for too long.
    /// Repeats on every call until a new message arrives.
    pub fn check_offline(&self, now: Instant) -> Vec<Message> {
        if !self.is_offline(now) {
            return Vec::new();
        }
        log::debug!("Device '{}' is offline", self.identity.topic_root);
        self.properties
            .iter()
            .flat_map(|property| property.offline_messages())
            .collect()
    }
}
