//! CONNACK reason codes and the outcome of a single connection attempt.
//!
//! Codes 0-5 are the MQTT 3.1.1 return codes, 128-157 the MQTT 5 reason
//! codes. Brokers speaking either dialect end up in the same table.

use rumqttc::ConnectReturnCode;

const REASONS: &[(u8, &str)] = &[
    (0, "Connection accepted"),
    (1, "Connection refused: unacceptable protocol version"),
    (2, "Connection refused: identifier rejected"),
    (3, "Connection refused: server unavailable"),
    (4, "Connection refused: bad user name or password"),
    (5, "Connection refused: not authorized"),
    (128, "Unspecified error"),
    (129, "Malformed packet"),
    (130, "Protocol error"),
    (131, "Implementation specific error"),
    (132, "Unsupported protocol version"),
    (133, "Client identifier not valid"),
    (134, "Bad user name or password"),
    (135, "Not authorized"),
    (136, "Server unavailable"),
    (137, "Server busy"),
    (138, "Banned"),
    (139, "Server shutting down"),
    (140, "Bad authentication method"),
    (141, "Keep alive timeout"),
    (142, "Session taken over"),
    (143, "Topic filter invalid"),
    (144, "Topic name invalid"),
    (145, "Receive maximum exceeded"),
    (146, "Topic alias invalid"),
    (147, "Packet too large"),
    (148, "Message rate too high"),
    (149, "Quota exceeded"),
    (150, "Administrative action"),
    (151, "Payload format invalid"),
    (152, "Retain not supported"),
    (153, "QoS not supported"),
    (154, "Use another server"),
    (155, "Server moved"),
    (156, "Shared subscriptions not supported"),
    (157, "Connection rate exceeded"),
];

/// Anything that can stand in for a CONNACK reason code.
pub trait ToReasonCode {
    fn reason_code(&self) -> u8;
}

impl ToReasonCode for u8 {
    fn reason_code(&self) -> u8 {
        *self
    }
}

impl ToReasonCode for ConnectReturnCode {
    fn reason_code(&self) -> u8 {
        match self {
            ConnectReturnCode::Success => 0,
            ConnectReturnCode::RefusedProtocolVersion => 1,
            ConnectReturnCode::BadClientId => 2,
            ConnectReturnCode::ServiceUnavailable => 3,
            ConnectReturnCode::BadUserNamePassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
        }
    }
}

/// Human readable text for a reason code, or a generic message carrying the
/// raw value when the code is not in the table.
pub fn connack_reason_message(code: impl ToReasonCode) -> String {
    let code = code.reason_code();
    REASONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| format!("Connection failed with reason code {}", code))
}

/// Which operator guidance a rejection calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionClass {
    /// Bad user name/password or not authorized (codes 4 and 5).
    Credentials,
    /// Everything else: protocol, identifier, availability.
    General,
}

impl RejectionClass {
    pub fn of(code: u8) -> Self {
        match code {
            4 | 5 => RejectionClass::Credentials,
            _ => RejectionClass::General,
        }
    }
}

/// Result of exactly one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Accepted,
    Rejected { code: u8, reason: String },
    TimedOut,
    TransportError(String),
}

impl ConnectionOutcome {
    pub fn from_reason_code(code: impl ToReasonCode) -> Self {
        match code.reason_code() {
            0 => ConnectionOutcome::Accepted,
            code => ConnectionOutcome::Rejected {
                code,
                reason: connack_reason_message(code),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ConnectionOutcome::Accepted)
    }

    pub fn rejection_class(&self) -> Option<RejectionClass> {
        match self {
            ConnectionOutcome::Rejected { code, .. } => Some(RejectionClass::of(*code)),
            _ => None,
        }
    }
}
