use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

type Flight<V> = Shared<BoxFuture<'static, V>>;

/// Keyed in-flight map: concurrent callers for the same key share one
/// underlying operation. The slot is cleared when the operation finishes,
/// whatever its result.
pub struct SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    inflight: DashMap<K, (u64, Flight<V>)>,
    next_id: AtomicU64,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Join the pending flight for `key`, or start one with `make`.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (flight_id, flight) = {
            let slot = self
                .inflight
                .entry(key.clone())
                .or_insert_with(|| (id, make().boxed().shared()));
            (slot.0, slot.1.clone())
        };
        if flight_id != id {
            tracing::trace!("joined flight {}", flight_id);
        }
        self.finish(key, flight_id, flight).await
    }

    /// Start a new flight for `key` even if one is pending. Later `run`
    /// callers join this one; the older flight still completes for its
    /// own waiters.
    pub async fn run_fresh<Fut>(&self, key: K, fut: Fut) -> V
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let flight = fut.boxed().shared();
        self.inflight.insert(key.clone(), (id, flight.clone()));
        self.finish(key, id, flight).await
    }

    /// Await the pending flight for `key`, if any.
    pub async fn join(&self, key: &K) -> Option<V> {
        let (flight_id, flight) = {
            let slot = self.inflight.get(key)?;
            (slot.0, slot.1.clone())
        };
        Some(self.finish(key.clone(), flight_id, flight).await)
    }

    #[cfg(test)]
    pub fn is_pending(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn clear(&self) {
        self.inflight.clear();
    }

    async fn finish(&self, key: K, flight_id: u64, flight: Flight<V>) -> V {
        let value = flight.await;
        self.inflight.remove_if(&key, |_, slot| slot.0 == flight_id);
        value
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
