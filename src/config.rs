use serde::Deserialize;
use std::time::Duration;

/// Tuning knobs for the batch orchestrator and the entity locker.
///
/// All fields have defaults, so a partial config file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Unpaid bookings older than this are eligible for auto-cancellation.
    pub cancellation_grace_hours: i64,
    /// Deadline notifications go out this many days ahead.
    pub notification_window_days: u32,
    /// Upper bound on how long a caller waits for an entity lock.
    pub lock_wait_ms: u64,
    /// Lease length of an entity lock; an expired lease may be stolen.
    pub lock_ttl_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            cancellation_grace_hours: 72,
            notification_window_days: 3,
            lock_wait_ms: 500,
            lock_ttl_ms: 30_000,
        }
    }
}

impl BatchConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}
