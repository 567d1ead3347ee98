//! `Environment` backed by the host: monotonic `Instant`, the system clock for
//! message timestamps, tokio timers and the OS entropy source.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use hybridchat_core::Environment;

/// Host environment for the server binary and QUIC clients.
///
/// Randomness comes from `getrandom`, so it is fit for RSA primes, session
/// keys and nonces, and is never reproducible.
///
/// # Panics
///
/// `random_bytes` panics if the OS entropy source fails, and
/// `wall_clock_millis` panics if the system clock reads before 1970.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Host environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        let since_epoch =
            SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock reads before 1970");
        since_epoch.as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS entropy source failed; refusing to derive keys");
    }
}
