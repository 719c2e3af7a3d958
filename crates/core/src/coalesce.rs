//! Request coalescing for concurrent identical reads.
//!
//! Callers asking for the same key while a read for it is in flight share
//! that read's outcome instead of issuing their own. Nothing is kept once the
//! read completes: the registry entry is removed before the outcome is
//! published, so the next caller starts a fresh read.
//!
//! The registry only holds a weak handle to each read. When every waiter
//! goes away the read is dropped along with its registration, and the next
//! caller starts over instead of joining a read it never asked for.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use tracing::debug;

type ReadFuture<V, E> = BoxFuture<'static, Result<V, E>>;
type Registry<K, V, E> = Arc<DashMap<K, InFlight<V, E>>>;

/// An in-flight read and the generation that registered it.
struct InFlight<V, E> {
    generation: u64,
    outcome: WeakShared<ReadFuture<V, E>>,
}

/// Removes its generation's registry entry when the read completes or is dropped.
struct Registration<K: Eq + Hash, V, E> {
    registry: Registry<K, V, E>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash, V, E> Drop for Registration<K, V, E> {
    fn drop(&mut self) {
        self.registry
            .remove_if(&self.key, |_, call| call.generation == self.generation);
    }
}

/// Deduplicates concurrent reads by key.
///
/// Independent keys never wait on each other; the registry is shard-locked
/// and no lock is held across an await.
pub struct Coalescer<K, V, E> {
    in_flight: Registry<K, V, E>,
    generation: AtomicU64,
}

impl<K, V, E> Coalescer<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs `fetch` for `key`, or joins the read already in flight for it.
    ///
    /// `fetch` is only invoked by the caller that registers the read.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let outcome = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut call) => {
                if let Some(outcome) = call.get().outcome.upgrade() {
                    debug!(generation = call.get().generation, "joining in-flight read");
                    outcome
                } else {
                    debug!(generation = call.get().generation, "replacing abandoned read");
                    let (registered, outcome) = self.start(key, fetch());
                    match registered {
                        Some(registered) => {
                            call.insert(registered);
                        }
                        None => {
                            call.remove();
                        }
                    }
                    outcome
                }
            }
            Entry::Vacant(slot) => {
                let (registered, outcome) = self.start(key, fetch());
                if let Some(registered) = registered {
                    slot.insert(registered);
                }
                outcome
            }
        };

        outcome.await
    }

    /// Wraps `read` so that it deregisters itself, and returns the registry
    /// entry for it along with the shared handle the caller awaits.
    fn start<Fut>(
        &self,
        key: K,
        read: Fut,
    ) -> (Option<InFlight<V, E>>, Shared<ReadFuture<V, E>>)
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            registry: Arc::clone(&self.in_flight),
            key,
            generation,
        };
        let outcome = async move {
            let _registration = registration;
            read.await
        }
        .boxed()
        .shared();

        let registered = outcome
            .downgrade()
            .map(|weak| InFlight {
                generation,
                outcome: weak,
            });
        (registered, outcome)
    }

    /// Number of keys with a read in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<K, V, E> Default for Coalescer<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
