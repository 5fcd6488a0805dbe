use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ReconnectConfig;
use crate::error::ClientError;

/// Attempt accounting and backoff policy for one engine.
///
/// Two limits apply: `attempts` per reconnection episode (cleared by
/// [`ReconnectController::reset`]) and `window_attempts` successful
/// reconnections inside the rolling `window`.
#[derive(Debug)]
pub struct ReconnectController {
    config: ReconnectConfig,
    attempts: u32,
    history: VecDeque<Instant>,
}

impl ReconnectController {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            history: VecDeque::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Whether another attempt may be made right now.
    pub fn allowed(&mut self) -> bool {
        self.prune(Instant::now());
        self.config.enabled
            && self.attempts < self.config.attempts
            && (self.history.len() as u32) < self.config.window_attempts
    }

    /// Delay the next attempt would wait, jitter included.
    pub fn next_delay(&self) -> Duration {
        let jitter = self.config.retry_delay_jitter;
        let sample = if jitter > 0.0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        self.delay_for(self.attempts.saturating_add(1), sample)
    }

    /// `retry_delay * multiplier^attempt * (1 + jitter_sample)`, capped at
    /// `retry_delay_max`.
    pub fn delay_for(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let cap = self.config.retry_delay_max.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.config.retry_delay.as_secs_f64()
            * self.config.retry_delay_multiplier.powi(exponent)
            * (1.0 + jitter_sample);
        let secs = if raw.is_finite() { raw.clamp(0.0, cap) } else { cap };
        Duration::from_secs_f64(secs)
    }

    /// Checks the limits, counts the attempt and returns how long to wait
    /// before making it.
    pub fn begin_attempt(&mut self) -> Result<Duration, ClientError> {
        if !self.allowed() {
            debug!(
                attempts = self.attempts,
                recent = self.history.len(),
                "reconnection not allowed"
            );
            return Err(ClientError::ReconnectExhausted);
        }
        let delay = self.next_delay();
        self.attempts += 1;
        debug!(attempt = self.attempts, ?delay, "reconnection attempt scheduled");
        Ok(delay)
    }

    /// Waits out the backoff for the next attempt, or fails once a limit is
    /// reached.
    pub async fn iterate(&mut self) -> Result<Duration, ClientError> {
        let delay = self.begin_attempt()?;
        tokio::time::sleep(delay).await;
        Ok(delay)
    }

    /// Records a successful (re)connection.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.attempts = 0;
        self.prune(now);
        self.history.push_back(now);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.history.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}
