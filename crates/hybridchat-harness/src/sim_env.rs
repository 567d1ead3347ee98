//! Turmoil-based Environment implementation for deterministic testing.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hybridchat_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall clock reading at the moment a `SimEnv` is created.
pub const SIM_EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Simulation environment using Turmoil's virtual time and seeded RNG.
///
/// This implementation provides:
///
/// - **Virtual Time**: `now()` returns Turmoil's simulated time, which can be
///   advanced instantly via `tokio::time::sleep()` inside the simulation.
///
/// - **Virtual Wall Clock**: `wall_clock_millis()` starts at
///   [`SIM_EPOCH_MILLIS`] and advances with virtual time.
///
/// - **Seeded RNG**: `random_bytes()` uses ChaCha20Rng seeded with a fixed
///   value, so keypairs, session keys and message ids repeat across runs.
///
/// # Usage
///
/// Time methods are only meaningful inside a Turmoil simulation (created by
/// `turmoil::Builder`). The RNG works anywhere.
#[derive(Clone)]
pub struct SimEnv {
    /// Shared across clones so the sequence never repeats within one run.
    /// Turmoil is single-threaded, so this Mutex never blocks.
    rng: Arc<Mutex<ChaCha20Rng>>,

    origin: tokio::time::Instant,
}

impl SimEnv {
    /// Create a new SimEnv with default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a new SimEnv with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock_millis(&self) -> u64 {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.origin);
        SIM_EPOCH_MILLIS.saturating_add(elapsed.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(|e| {
                // Turmoil is single threaded; only a panic while holding the
                // lock can poison it
                unreachable!("RNG mutex poisoned in single-threaded context: {}", e)
            })
            .fill_bytes(dest);
    }
}
