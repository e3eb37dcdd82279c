use std::fmt::Display;
use std::io::{self, Write};

use crate::config::ConnectionTarget;
use crate::mqtt::{ConnectionOutcome, RejectionClass};

/// Status tag printed at the start of each operator line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Ok,
    Warn,
    Error,
    Info,
}

impl Tag {
    fn as_str(self) -> &'static str {
        match self {
            Tag::Ok => "[OK]",
            Tag::Warn => "[WARN]",
            Tag::Error => "[ERROR]",
            Tag::Info => "[INFO]",
        }
    }
}

/// Line-oriented operator output. Defaults to stdout; tests hand in a buffer.
pub struct Console<W: Write> {
    out: W,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, tag: Tag, message: impl Display) {
        // Nothing useful to do if stdout is gone.
        let _ = writeln!(self.out, "{} {}", tag.as_str(), message);
    }

    /// Indented continuation of the previous line.
    pub fn detail(&mut self, message: impl Display) {
        let _ = writeln!(self.out, "       {}", message);
    }

    pub fn ok(&mut self, message: impl Display) {
        self.line(Tag::Ok, message);
    }

    pub fn warn(&mut self, message: impl Display) {
        self.line(Tag::Warn, message);
    }

    pub fn error(&mut self, message: impl Display) {
        self.line(Tag::Error, message);
    }

    pub fn info(&mut self, message: impl Display) {
        self.line(Tag::Info, message);
    }

    pub fn report_target(&mut self, target: &ConnectionTarget) {
        self.info(format!(
            "MQTT target configuration: scheme={} host={} port={} user={} password={}",
            target.scheme(),
            target.host,
            target.port,
            target.username.as_deref().unwrap_or("(none)"),
            mask_password(target.password.as_deref()),
        ));
    }

    pub fn report_outcome(&mut self, outcome: &ConnectionOutcome, target: &ConnectionTarget) {
        match outcome {
            ConnectionOutcome::Accepted => {
                self.ok("MQTT connection established successfully.");
            }
            ConnectionOutcome::TransportError(message) => {
                self.error(format!(
                    "Could not reach MQTT broker at {}:{} -> {}",
                    target.host, target.port, message
                ));
            }
            ConnectionOutcome::TimedOut => {
                self.error(
                    "Timed out waiting for MQTT CONNACK; broker unreachable or not responding.",
                );
            }
            ConnectionOutcome::Rejected { reason, .. } => {
                self.error(format!("MQTT broker rejected connection: {}", reason));
                if outcome.rejection_class() == Some(RejectionClass::Credentials) {
                    self.detail("Check the username/password configured for the broker.");
                } else {
                    self.detail("Verify host, port, TLS settings, and broker availability.");
                }
            }
        }
    }
}

/// Shows only the first and last character of a secret.
pub fn mask_password(secret: Option<&str>) -> String {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return "(none)".to_string(),
    };

    let mut chars = secret.chars();
    let first = chars.next().unwrap_or_default();
    let last = chars.next_back().unwrap_or(first);
    format!("{}***{}", first, last)
}
