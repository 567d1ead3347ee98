//! RNG adapter over [`Environment`].
//!
//! The crypto crate takes `RngCore + CryptoRng`; the client only has an
//! environment. Routing every random byte through the environment keeps
//! simulated runs reproducible from the simulation seed.

use hybridchat_core::Environment;
use rand::{CryptoRng, RngCore};

/// Borrowed environment exposed as a cryptographic RNG.
///
/// Only as strong as the environment's `random_bytes`, which the
/// [`Environment`] contract requires to be cryptographically secure.
pub struct EnvRng<'a, E: Environment> {
    env: &'a E,
}

impl<'a, E: Environment> EnvRng<'a, E> {
    /// Wrap an environment.
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.env.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.env.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.env.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.env.random_bytes(dest);
        Ok(())
    }
}

impl<E: Environment> CryptoRng for EnvRng<'_, E> {}
