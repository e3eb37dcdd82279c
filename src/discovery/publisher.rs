use std::io::Write;
use tracing::{debug, info, warn};

use crate::mqtt::{MqttError, RetainedPublish};
use crate::utils::Console;
use super::catalog::{Catalog, SensorDescriptor};

/// Tally of one discovery run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub published: usize,
    pub failed: Vec<String>,
}

impl PublishReport {
    pub fn all_published(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `<prefix>/sensor/<unique_id>/config`
pub fn discovery_topic(prefix: &str, unique_id: &str) -> String {
    format!("{}/sensor/{}/config", prefix, unique_id)
}

/// Publishes one retained config message per sensor. A failed sensor is
/// reported and skipped; the rest are still attempted.
pub async fn publish_discovery<P, W>(
    publisher: &P,
    catalog: &Catalog,
    prefix: &str,
    console: &mut Console<W>,
) -> PublishReport
where
    P: RetainedPublish,
    W: Write,
{
    info!("Publishing discovery for {} sensors", catalog.sensors.len());
    let mut report = PublishReport::default();

    for sensor in &catalog.sensors {
        let topic = discovery_topic(prefix, &sensor.unique_id);
        match publish_sensor(publisher, catalog, sensor, &topic).await {
            Ok(()) => {
                console.ok(format!("Published discovery for {} to {}", sensor.name, topic));
                report.published += 1;
            }
            Err(e) => {
                warn!("Discovery publish for {} failed: {}", sensor.unique_id, e);
                console.warn(format!("Failed to publish {} config ({}).", sensor.name, e));
                report.failed.push(sensor.unique_id.clone());
            }
        }
    }

    info!(
        "Discovery finished: {} published, {} failed",
        report.published,
        report.failed.len()
    );
    report
}

async fn publish_sensor<P: RetainedPublish>(
    publisher: &P,
    catalog: &Catalog,
    sensor: &SensorDescriptor,
    topic: &str,
) -> Result<(), MqttError> {
    let payload = sensor.discovery_payload(&catalog.device)?;
    debug!("Publishing {} bytes to {}", payload.len(), topic);
    publisher.publish_retained(topic, payload).await
}
