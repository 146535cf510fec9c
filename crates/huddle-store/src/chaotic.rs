//! Chaotic store wrapper for fault injection testing
//!
//! Store wrapper that randomly fails operations to test error handling and
//! recovery. Used for chaos testing to ensure the sync core handles store
//! failures gracefully: one-shot operations surface `StoreUnavailable`, seen
//! receipts heal on the next batch, and the last-message preview lags but
//! converges.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle_core::store::{
    CollectionPath, DocumentSnapshot, DocumentStore, FieldUpdate, Fields, Query, StoreError,
    Subscription,
};

/// Which operations the chaos applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosScope {
    /// Every operation may fail.
    All,
    /// Only writes (set, update, add) may fail; reads and subscriptions pass.
    WritesOnly,
    /// Only partial updates may fail (seen receipts, last-message projection,
    /// group edits).
    UpdatesOnly,
}

/// Chaotic store wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate. Uses Arc<Mutex<>> for the RNG state, making it
/// Clone and thread-safe. Injected failures are `Unavailable`, the only
/// failure a healthy backend produces at random.
#[derive(Clone)]
pub struct ChaoticStore<S: DocumentStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// Operations subject to chaos
    scope: ChaosScope,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counters (attempted, injected failures)
    counters: Arc<Mutex<(usize, usize)>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Uses linear congruential generator (LCG) for fast, deterministic
/// randomness. This ensures chaos tests are reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Read,
    Write,
    Update,
}

impl<S: DocumentStore> ChaoticStore<S> {
    /// Create a new chaotic store wrapper affecting every operation.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, ChaosScope::All, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit scope and seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic)]
    pub fn with_seed(inner: S, failure_rate: f64, scope: ChaosScope, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            scope,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            counters: Arc::new(Mutex::new((0, 0))),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.counters.lock().expect("counters mutex poisoned").0
    }

    /// Number of operations that failed by injection.
    pub fn injected_failures(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.counters.lock().expect("counters mutex poisoned").1
    }

    /// Count the operation and decide whether it fails.
    fn roll(&self, kind: OpKind) -> Result<(), StoreError> {
        let eligible = match self.scope {
            ChaosScope::All => true,
            ChaosScope::WritesOnly => kind != OpKind::Read,
            ChaosScope::UpdatesOnly => kind == OpKind::Update,
        };

        #[allow(clippy::expect_used)]
        let mut counters = self.counters.lock().expect("counters mutex poisoned");
        counters.0 += 1;

        #[allow(clippy::expect_used)]
        let fail =
            eligible
                && self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            counters.1 += 1;
            return Err(StoreError::Unavailable("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ChaoticStore<S> {
    async fn get_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.roll(OpKind::Read)?;
        self.inner.get_document(collection, id).await
    }

    async fn set_document(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.roll(OpKind::Write)?;
        self.inner.set_document(collection, id, fields).await
    }

    async fn update_fields(
        &self,
        collection: &CollectionPath,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StoreError> {
        self.roll(OpKind::Update)?;
        self.inner.update_fields(collection, id, updates).await
    }

    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentSnapshot, StoreError> {
        self.roll(OpKind::Write)?;
        self.inner.add_document(collection, fields).await
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.roll(OpKind::Read)?;
        self.inner.query_documents(collection, query).await
    }

    async fn subscribe_query(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription<Vec<DocumentSnapshot>>, StoreError> {
        self.roll(OpKind::Read)?;
        self.inner.subscribe_query(collection, query).await
    }

    async fn subscribe_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Subscription<Option<DocumentSnapshot>>, StoreError> {
        self.roll(OpKind::Read)?;
        self.inner.subscribe_document(collection, id).await
    }
}
