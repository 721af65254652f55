//! Translates sensor readings received over MQTT (e.g. from rtl_433) into
//! Home Assistant MQTT discovery, availability and state messages.

pub mod bridge;
pub mod config;
pub mod device;
pub mod hass;
pub mod property;

pub use bridge::{Bridge, MessageSink};
pub use device::{Device, OnlineCheck};
pub use property::{Message, Property, State};
