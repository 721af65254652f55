use std::fmt::Display;
use std::time::Instant;

use crate::device::Device;
use crate::property::Message;

/// Destination of the Home Assistant messages, usually an MQTT client.
pub trait MessageSink {
    type Error: Display;

    fn publish(&mut self, message: &Message) -> Result<(), Self::Error>;
}

pub struct Bridge<S: MessageSink> {
    devices: Vec<Device>,
    sink: S,
}

impl<S: MessageSink> Bridge<S> {
    pub fn new(devices: Vec<Device>, sink: S) -> Self {
        Self {
            devices,
            sink,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Input topics to subscribe to, one per device
    pub fn input_topics(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.input_topic().to_string()).collect()
    }

    /// Routes an inbound message to every device and forwards what they produce.
    /// Returns the number of published messages.
    pub fn on_message(&mut self, topic: &str, payload: &[u8], now: Instant) -> usize {
        let mut published = 0;
        for device in self.devices.iter_mut() {
            let messages = device.handle_message(topic, payload, now);
            published += forward(&mut self.sink, &messages);
        }
        published
    }

    /// Announces every silent device as offline.
    /// Returns the number of published messages.
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut published = 0;
        for device in self.devices.iter() {
            let messages = device.check_offline(now);
            published += forward(&mut self.sink, &messages);
        }
        published
    }
}

fn forward<S: MessageSink>(sink: &mut S, messages: &[Message]) -> usize {
    let mut published = 0;
    for message in messages {
        log::trace!("Sending message to {}: {}", message.topic, message.payload);
        match sink.publish(message) {
            Ok(()) => published += 1,
            Err(e) => log::warn!("Cannot publish to {}: {e}", message.topic),
        }
    }
    published
}
