pub mod client;
pub mod reason;
mod tls;

use thiserror::Error;

pub use client::{MqttSession, RetainedPublish};
pub use reason::{ConnectionOutcome, RejectionClass};

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("MQTT client rejected request: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("could not encode payload: {0}")]
    Payload(#[from] serde_json::Error),
}
