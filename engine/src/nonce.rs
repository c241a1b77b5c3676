//! Nonce generation for the element version clock.
//!
//! Two peers that independently bump the same element to the same version are
//! disambiguated by the nonce alone, so the production source must carry
//! enough entropy that collisions are negligible. The source is a trait so
//! tests can inject deterministic sequences and assert exact tiebreak
//! outcomes.

use crate::VersionNonce;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of tiebreak nonces for element mutations.
pub trait NonceSource {
    /// Draw the next nonce.
    fn next_nonce(&mut self) -> VersionNonce;
}

/// The production source: a CSPRNG-seeded generator.
#[derive(Debug)]
pub struct RandomNonceSource {
    rng: StdRng,
}

impl RandomNonceSource {
    /// Create a source seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a source with a fixed seed (reproducible runs).
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomNonceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceSource for RandomNonceSource {
    fn next_nonce(&mut self) -> VersionNonce {
        self.rng.gen()
    }
}

/// A deterministic source that counts up from a starting value.
///
/// Intended for tests that need to know every nonce in advance.
#[derive(Debug, Default)]
pub struct SequentialNonceSource {
    next: VersionNonce,
}

impl SequentialNonceSource {
    /// Create a source that yields `start`, `start + 1`, ...
    pub fn starting_at(start: VersionNonce) -> Self {
        Self { next: start }
    }
}

impl NonceSource for SequentialNonceSource {
    fn next_nonce(&mut self) -> VersionNonce {
        let nonce = self.next;
        self.next = self.next.wrapping_add(1);
        nonce
    }
}
