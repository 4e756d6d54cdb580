//! Back-off policy for re-establishing a lost video session.
//!
//! The first attempt waits [`ReconnectConfig::cooldown`]; each further
//! attempt waits longer by [`ReconnectConfig::multiplier`], clamped to
//! [`ReconnectConfig::max_delay`]. After
//! [`ReconnectConfig::max_attempts`] failures the session gives up.

use std::time::Duration;

/// Tunable parameters for the reconnect strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub cooldown: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Attempts before the session is declared dead.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

/// Wait before the attempt that follows one waiting `previous`.
///
/// With the defaults the session waits 5 s, 10 s, then 20 s across its
/// three attempts; no wait ever exceeds [`ReconnectConfig::max_delay`].
pub fn next_delay(previous: Duration, config: &ReconnectConfig) -> Duration {
    previous.mul_f64(config.multiplier).min(config.max_delay)
}
