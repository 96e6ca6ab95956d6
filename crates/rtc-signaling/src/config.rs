//! Signaling layer configuration.
//!
//! Configuration is loaded from environment variables. The public address
//! and the inclusive UDP port range are consumed once at startup; an
//! invalid range is fatal (see [`SignalingDelegate::start_or_exit`]).
//!
//! [`SignalingDelegate::start_or_exit`]: crate::delegate::SignalingDelegate::start_or_exit

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Default public address advertised in answers.
pub const DEFAULT_PUBLIC_ADDRESS: &str = "127.0.0.1";

/// Default inclusive UDP port range for transport allocation.
pub const DEFAULT_PORT_RANGE: &str = "50000-50999";

/// Inclusive UDP port range handed to the media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Build a range, rejecting `min > max` and port 0.
    pub fn new(min: u16, max: u16) -> Result<Self, ConfigError> {
        if min == 0 {
            return Err(ConfigError::InvalidValue(
                "port range must not include port 0".to_string(),
            ));
        }
        if min > max {
            return Err(ConfigError::InvalidValue(format!(
                "port range minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Lowest port (inclusive).
    #[must_use]
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Highest port (inclusive).
    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports in the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        (self.max - self.min) as u32 + 1
    }

    /// A valid range always holds at least one port.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl FromStr for PortRange {
    type Err = ConfigError;

    /// Parses `"<min>-<max>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ConfigError::InvalidValue(format!("port range '{s}' is not min-max")))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue(format!("port range '{s}': {e}")))
        };

        Self::new(parse(min)?, parse(max)?)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Signaling layer configuration.
#[derive(Clone)]
pub struct Config {
    /// Public IP advertised in the `c=` line of every answer.
    pub public_address: IpAddr,

    /// Inclusive UDP port range for transport allocation.
    pub port_range: PortRange,

    /// Emit JSON-formatted logs.
    pub json_logs: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("public_address", &self.public_address)
            .field("port_range", &format_args!("{}", self.port_range))
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let address = vars
            .get("WEBRTC_ADDRESS")
            .map_or(DEFAULT_PUBLIC_ADDRESS, String::as_str);
        let public_address = address.trim().parse::<IpAddr>().map_err(|e| {
            ConfigError::InvalidValue(format!("WEBRTC_ADDRESS '{address}': {e}"))
        })?;

        let port_range = vars
            .get("WEBRTC_PORT_RANGE")
            .map_or(DEFAULT_PORT_RANGE, String::as_str)
            .parse::<PortRange>()?;

        let json_logs = vars
            .get("RTC_JSON_LOGS")
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"));

        Ok(Config {
            public_address,
            port_range,
            json_logs,
        })
    }
}
