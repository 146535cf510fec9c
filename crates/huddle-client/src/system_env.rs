//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` reads the wall clock and the OS RNG, so production behavior is
//! non-deterministic. Tests use the seeded simulation environment instead.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use huddle_core::{Environment, Timestamp};

/// Production environment using the system clock and OS randomness.
///
/// The wall clock may step backwards (NTP adjustments); readings are clamped
/// to the largest value returned so far so `now()` stays monotonic. Clones
/// share the clamp.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. Group room ids would otherwise
/// stop being unique, and RNG failure indicates OS-level issues.
#[derive(Clone, Default)]
pub struct SystemEnv {
    last_millis: Arc<AtomicU64>,
}

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        let previous = self.last_millis.fetch_max(wall, Ordering::AcqRel);
        Timestamp::from_millis(previous.max(wall))
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
