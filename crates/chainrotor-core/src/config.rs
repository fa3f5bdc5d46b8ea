//! Rotator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default exclusion after a failed call.
pub const DEFAULT_EXCLUSION_COOLDOWN: Duration = Duration::from_secs(15);

/// Policy knobs for a [`Rotator`](crate::rotator::Rotator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatorConfig {
    /// How long a failed slot stays out of rotation, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub exclusion_cooldown_ms: u64,
    /// Per-call timeout applied by `Rotator`'s own `RpcTransport` impl.
    /// Zero disables it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_cooldown_ms() -> u64 { DEFAULT_EXCLUSION_COOLDOWN.as_millis() as u64 }
fn default_request_timeout_ms() -> u64 { 30_000 }

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            exclusion_cooldown_ms: default_cooldown_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RotatorConfig {
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.exclusion_cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.exclusion_cooldown_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}
