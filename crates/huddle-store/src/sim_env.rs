//! Simulation environment with a virtual clock and seeded RNG.
//!
//! Same seed, same sequence of ids and timestamps: a failing scenario
//! reproduces exactly.

#![allow(clippy::disallowed_types, reason = "Locking simple clock and RNG state")]

use std::sync::{Arc, Mutex};

use huddle_core::{Environment, Timestamp};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Virtual clock start: 2024-01-01T00:00:00Z.
const EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Deterministic environment for tests and simulation.
///
/// Every `now()` reading advances the virtual clock by one millisecond, so
/// successive events get strictly increasing timestamps. Use
/// [`advance`](Self::advance) to model larger gaps. Clones share the clock
/// and RNG.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<SimState>>,
}

struct SimState {
    now_millis: u64,
    rng: ChaCha8Rng,
}

impl SimEnv {
    /// Environment seeded with `seed`, clock at the simulation epoch.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                now_millis: EPOCH_MILLIS,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Move the virtual clock forward.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for simulation
    /// code.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, millis: u64) {
        self.inner.lock().expect("SimEnv mutex poisoned").now_millis += millis;
    }

    /// Current virtual time without advancing the clock.
    #[allow(clippy::expect_used)]
    pub fn peek(&self) -> Timestamp {
        Timestamp::from_millis(self.inner.lock().expect("SimEnv mutex poisoned").now_millis)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    #[allow(clippy::expect_used)]
    fn now(&self) -> Timestamp {
        let mut state = self.inner.lock().expect("SimEnv mutex poisoned");
        state.now_millis += 1;
        Timestamp::from_millis(state.now_millis)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.lock().expect("SimEnv mutex poisoned").rng.fill_bytes(buffer);
    }
}
