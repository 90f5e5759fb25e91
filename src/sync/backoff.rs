use std::time::Duration;

use crate::config::ReconnectConfig;

/// Reconnect timing for the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
    /// Sessions ending sooner than this count as failures.
    pub min_session: Duration,
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_secs(config.initial_backoff_secs),
            max: Duration::from_secs(config.max_backoff_secs.max(config.initial_backoff_secs)),
            max_attempts: config.max_attempts,
            min_session: Duration::from_secs(config.min_session_secs),
        }
    }
}

/// Capped exponential backoff over consecutive connection failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// Called after a successful connect.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failure and return how long to wait, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if let Some(max_attempts) = self.policy.max_attempts
            && self.failures >= max_attempts
        {
            return None;
        }

        let exponent = (self.failures - 1).min(16);
        let delay = self.policy.initial.saturating_mul(1 << exponent);
        Some(delay.min(self.policy.max))
    }
}
