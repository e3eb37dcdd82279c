//! Home Assistant MQTT discovery for the gas meter.
//!
//! Each sensor gets one retained config message under
//! `<prefix>/sensor/<unique_id>/config`. Home Assistant picks these up on
//! start and whenever they change; live readings arrive separately on the
//! sensors' state topic.
//!
//! Reference: https://www.home-assistant.io/integrations/mqtt/#mqtt-discovery

pub mod catalog;
pub mod publisher;

pub use catalog::Catalog;
pub use publisher::publish_discovery;
