//! In-memory collaborators for the Huddle sync core.
//!
//! Test doubles and simulation implementations of the external contracts
//! declared in [`huddle_core`]:
//!
//! - [`MemoryStore`]: realtime document store with live queries
//! - [`ChaoticStore`]: fault-injecting wrapper around any store
//! - [`MemoryIdentity`]: email/password identity provider
//! - [`SimEnv`]: virtual clock and seeded RNG

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod identity;
mod memory;
mod sim_env;

pub use chaotic::{ChaosScope, ChaoticStore};
pub use identity::{MIN_PASSWORD_LEN, MemoryIdentity};
pub use memory::MemoryStore;
pub use sim_env::SimEnv;
