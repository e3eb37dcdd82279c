use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing, Packet,
    QoS,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use std::time::Duration;

use crate::config::MqttConfig;
use super::reason::{ConnectionOutcome, ToReasonCode};
use super::{tls, MqttError};

/// How long to wait for the broker's CONNACK.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);
/// rumqttc's own socket/CONNACK timeout. Kept above CONNECT_TIMEOUT so a
/// silent broker surfaces as a timeout rather than a transport error.
const NETWORK_TIMEOUT_SECS: u64 = 30;
/// Upper bound for flushing DISCONNECT once publishing is done.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 16;

/// What the event loop reports back for the first connection attempt.
#[derive(Debug)]
pub enum AckSignal {
    /// A CONNACK arrived with this reason code.
    Code(u8),
    /// The transport failed before any CONNACK.
    Transport(String),
}

/// Publishes retained messages on an open session.
#[allow(async_fn_in_trait)]
pub trait RetainedPublish {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<(), MqttError>;
}

/// One broker connection plus the task that drives it.
pub struct MqttSession {
    client: AsyncClient,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttSession {
    /// Opens the connection and waits for a definite outcome.
    ///
    /// The session is returned whatever the outcome; dropping it stops the
    /// event loop.
    pub async fn connect(config: &MqttConfig) -> (Self, ConnectionOutcome) {
        let target = &config.target;
        let mut mqtt_options = MqttOptions::new(&config.client_id, &target.host, target.port);

        if let Some((username, password)) = target.credentials() {
            mqtt_options.set_credentials(username, password);
        }

        mqtt_options.set_keep_alive(KEEP_ALIVE);
        mqtt_options.set_clean_session(true);
        mqtt_options.set_max_packet_size(1024 * 1024, 1024 * 1024); // 1MB

        if target.use_tls {
            mqtt_options.set_transport(tls::insecure_transport());
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let mut network_options = NetworkOptions::new();
        network_options.set_connection_timeout(NETWORK_TIMEOUT_SECS);
        eventloop.set_network_options(network_options);

        // The sender is owned by the loop before its first poll, which is
        // what opens the socket, so the acknowledgment cannot be missed.
        let (ack_tx, ack_rx) = oneshot::channel();
        info!(
            "Connecting to MQTT broker at {}:{} as {}",
            target.host, target.port, config.client_id
        );
        let handle = tokio::spawn(drive_event_loop(eventloop, ack_tx));

        let outcome = await_outcome(ack_rx, CONNECT_TIMEOUT).await;
        info!("Connection outcome: {:?}", outcome);

        let session = Self {
            client,
            event_loop: Some(handle),
        };
        (session, outcome)
    }

    /// Sends DISCONNECT after everything already queued and waits for the
    /// event loop to wind down.
    pub async fn close(mut self) {
        info!("Disconnecting from MQTT broker...");
        if let Err(e) = self.client.disconnect().await {
            error!("Error queueing MQTT disconnect: {}", e);
        }

        if let Some(mut handle) = self.event_loop.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => debug!("MQTT event loop stopped"),
                Ok(Err(e)) => error!("MQTT event loop task failed: {}", e),
                Err(_) => {
                    warn!("MQTT event loop did not stop within {:?}, aborting", CLOSE_TIMEOUT);
                    handle.abort();
                }
            }
        }
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
    }
}

impl RetainedPublish for MqttSession {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<(), MqttError> {
        self.client
            .publish(topic, QoS::AtMostOnce, true, payload)
            .await?;
        Ok(())
    }
}

/// Waits for the first acknowledgment signal, bounded by `bound`.
pub async fn await_outcome(ack: oneshot::Receiver<AckSignal>, bound: Duration) -> ConnectionOutcome {
    match tokio::time::timeout(bound, ack).await {
        Ok(Ok(AckSignal::Code(code))) => ConnectionOutcome::from_reason_code(code),
        Ok(Ok(AckSignal::Transport(message))) => ConnectionOutcome::TransportError(message),
        Ok(Err(_)) => ConnectionOutcome::TransportError(
            "MQTT event loop stopped before the broker answered".to_string(),
        ),
        Err(_) => ConnectionOutcome::TimedOut,
    }
}

/// Polls the event loop until DISCONNECT goes out or the connection fails.
/// The first CONNACK or transport failure is reported through `ack`; the
/// loop never reconnects.
async fn drive_event_loop(mut eventloop: EventLoop, ack: oneshot::Sender<AckSignal>) {
    let mut ack = Some(ack);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                info!("MQTT Connection acknowledged: {:?}", connack.code);
                signal(&mut ack, AckSignal::Code(connack.code.reason_code()));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Outgoing MQTT disconnect, stopping event loop");
                break;
            }
            Ok(Event::Outgoing(packet)) => {
                debug!("Outgoing MQTT packet: {:?}", packet);
            }
            Ok(event) => {
                debug!("Other MQTT event: {:?}", event);
            }
            Err(ConnectionError::ConnectionRefused(code)) => {
                warn!("MQTT broker refused connection: {:?}", code);
                signal(&mut ack, AckSignal::Code(code.reason_code()));
                break;
            }
            Err(e) => {
                if let Some(code) = unknown_return_code(&e) {
                    warn!("MQTT broker answered with unknown return code {}", code);
                    signal(&mut ack, AckSignal::Code(code));
                } else if ack.is_some() {
                    signal(&mut ack, AckSignal::Transport(e.to_string()));
                } else {
                    error!("MQTT eventloop error: {}", e);
                }
                break;
            }
        }
    }
}

/// A CONNACK code outside MQTT 3.1.1's 0-5 fails rumqttc's decoder, which
/// hands it back as an `InvalidData` I/O error carrying only the message,
/// although the broker did answer.
fn unknown_return_code(error: &ConnectionError) -> Option<u8> {
    const PREFIX: &str = "Invalid Connect return code: ";
    match error {
        ConnectionError::Io(io) if io.kind() == std::io::ErrorKind::InvalidData => {
            io.to_string().strip_prefix(PREFIX)?.trim().parse().ok()
        }
        _ => None,
    }
}

fn signal(ack: &mut Option<oneshot::Sender<AckSignal>>, value: AckSignal) {
    if let Some(tx) = ack.take() {
        // The receiver is gone once the connect wait has timed out.
        if tx.send(value).is_err() {
            debug!("Connection signal arrived after the wait ended");
        }
    }
}
