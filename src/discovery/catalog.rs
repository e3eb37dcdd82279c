use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

pub const PAYLOAD_AVAILABLE: &str = "Online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "Offline";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("catalog defines no sensors")]
    Empty,

    #[error("duplicate sensor unique_id '{0}'")]
    DuplicateUniqueId(String),
}

/// The physical device every sensor belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
    pub configuration_url: String,
}

/// One Home Assistant sensor entity. Field names are the discovery keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub value_template: String,
    pub unit_of_measurement: String,
    pub device_class: String,
    pub state_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub device: DeviceDescriptor,
    pub sensors: Vec<SensorDescriptor>,
}

#[derive(Serialize)]
struct DiscoveryPayload<'a> {
    #[serde(flatten)]
    sensor: &'a SensorDescriptor,
    payload_available: &'static str,
    payload_not_available: &'static str,
    device: &'a DeviceDescriptor,
}

impl Catalog {
    /// The gas meter catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.sensors.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.unique_id.as_str()) {
                return Err(CatalogError::DuplicateUniqueId(sensor.unique_id.clone()));
            }
        }
        Ok(())
    }
}

impl SensorDescriptor {
    /// JSON config document for this sensor with the device embedded.
    pub fn discovery_payload(&self, device: &DeviceDescriptor) -> serde_json::Result<String> {
        serde_json::to_string(&DiscoveryPayload {
            sensor: self,
            payload_available: PAYLOAD_AVAILABLE,
            payload_not_available: PAYLOAD_NOT_AVAILABLE,
            device,
        })
    }
}
