use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;

/// Backoff and limit policy for automatic reconnection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Attempts allowed per reconnection episode.
    pub attempts: u32,
    /// Successful reconnections allowed inside `window`.
    pub window_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    pub retry_delay_multiplier: f64,
    /// Fraction of the computed delay added or removed at random.
    pub retry_delay_jitter: f64,
    #[serde(with = "humantime_serde")]
    pub retry_delay_max: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: 5,
            window_attempts: 20,
            window: Duration::from_secs(5 * 60),
            retry_delay: Duration::from_secs(1),
            retry_delay_multiplier: 2.0,
            retry_delay_jitter: 0.1,
            retry_delay_max: Duration::from_secs(60),
        }
    }
}

impl ReconnectConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectConfig,
    /// Capacity of the queue between client handles and the engine task.
    pub outbound_queue_capacity: usize,
    /// How many live notifications are held for ids nobody listens to yet.
    pub notification_buffer_capacity: usize,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            outbound_queue_capacity: 256,
            notification_buffer_capacity: 1024,
            namespace: None,
            database: None,
            token: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ClientError> {
        let config: Self =
            toml::from_str(input).map_err(|err| ClientError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|err| ClientError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.keepalive_interval.is_zero() {
            return Err(ClientError::Config(
                "keepalive_interval must be non-zero".into(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ClientError::Config(
                "outbound_queue_capacity must be non-zero".into(),
            ));
        }
        if self.notification_buffer_capacity == 0 {
            return Err(ClientError::Config(
                "notification_buffer_capacity must be non-zero".into(),
            ));
        }
        let reconnect = &self.reconnect;
        if !(reconnect.retry_delay_multiplier >= 1.0) {
            return Err(ClientError::Config(format!(
                "retry_delay_multiplier must be at least 1, got {}",
                reconnect.retry_delay_multiplier
            )));
        }
        if !(0.0..1.0).contains(&reconnect.retry_delay_jitter) {
            return Err(ClientError::Config(format!(
                "retry_delay_jitter must be in [0, 1), got {}",
                reconnect.retry_delay_jitter
            )));
        }
        if reconnect.window.is_zero() || reconnect.window_attempts == 0 {
            return Err(ClientError::Config(
                "reconnect window must allow at least one reconnection".into(),
            ));
        }
        Ok(())
    }
}
