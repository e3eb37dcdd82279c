use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
const CLIENT_ID_PREFIX: &str = "smartgas-discovery";

/// Command line surface. Every option falls back to its `MQTT_*` variable,
/// which may also come from a `.env` file in the working directory.
#[derive(Debug, Parser)]
#[command(
    name = "smartgas-discovery",
    version,
    about = "Publish SmartGas MQTT Discovery to Home Assistant"
)]
pub struct Cli {
    /// MQTT broker host (overrides MQTT_HOST env var)
    #[arg(long, env = "MQTT_HOST")]
    pub host: String,

    /// MQTT broker port (overrides MQTT_PORT env var)
    #[arg(long, env = "MQTT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// MQTT username (overrides MQTT_USER env var)
    #[arg(long, env = "MQTT_USER")]
    pub user: Option<String>,

    /// MQTT password (overrides MQTT_PASS env var)
    #[arg(long, env = "MQTT_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Enable TLS for the MQTT connection (overrides MQTT_SSL env var)
    #[arg(long, overrides_with = "no_ssl")]
    pub ssl: bool,

    /// Disable TLS even if MQTT_SSL is set
    #[arg(long, overrides_with = "ssl")]
    pub no_ssl: bool,

    /// MQTT client identifier; a random one is generated when omitted
    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Home Assistant discovery topic prefix
    #[arg(long, env = "MQTT_DISCOVERY_PREFIX", default_value = DEFAULT_DISCOVERY_PREFIX)]
    pub discovery_prefix: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub target: ConnectionTarget,
    pub client_id: String,
}

/// Where and how to reach the broker. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub prefix: String,
}

impl Config {
    /// Loads `.env`, parses the process arguments and resolves the TLS flag.
    pub fn load() -> Result<Self> {
        // A missing .env is the normal case; a broken one is not.
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env file"),
        }

        let cli = Cli::parse();
        let env_ssl = std::env::var("MQTT_SSL").ok();
        Ok(cli.into_config(env_ssl.as_deref()))
    }
}

impl Cli {
    pub fn into_config(self, env_ssl: Option<&str>) -> Config {
        let use_tls = resolve_tls(self.ssl, self.no_ssl, env_ssl);
        let client_id = non_empty(self.client_id)
            .unwrap_or_else(|| format!("{}-{}", CLIENT_ID_PREFIX, Uuid::new_v4().simple()));

        Config {
            mqtt: MqttConfig {
                target: ConnectionTarget {
                    host: self.host,
                    port: self.port,
                    username: non_empty(self.user),
                    password: non_empty(self.password),
                    use_tls,
                },
                client_id,
            },
            discovery: DiscoveryConfig {
                prefix: self.discovery_prefix,
            },
        }
    }
}

impl ConnectionTarget {
    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "mqtts"
        } else {
            "mqtt"
        }
    }

    /// Credentials are only sent when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

/// Explicit flags win in both directions; otherwise `MQTT_SSL` decides.
pub fn resolve_tls(ssl: bool, no_ssl: bool, env_ssl: Option<&str>) -> bool {
    if ssl {
        true
    } else if no_ssl {
        false
    } else {
        str_to_bool(env_ssl, false)
    }
}

pub fn str_to_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
