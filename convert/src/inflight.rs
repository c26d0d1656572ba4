use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use futures::future::{BoxFuture, FutureExt, Shared};

type SharedWork<V> = Shared<BoxFuture<'static, V>>;

/// At most one running piece of work per key. Callers arriving while work for
/// their key is running wait for that work and get a clone of its output.
/// Nothing is cached: the entry disappears once the first caller is done or
/// gives up, so the next caller starts fresh.
pub struct InFlight<K, V: Clone> {
    pending: Mutex<HashMap<K, (u64, SharedWork<V>)>>,
    next_id: AtomicU64,
}

impl<K, V> Default for InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        InFlight {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let (work, guard) = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some((_, work)) => (work.clone(), None),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let work = start().shared();
                    pending.insert(key.clone(), (id, work.clone()));
                    (work, Some(PendingGuard { owner: self, key, id }))
                }
            }
        };
        let output = work.await;
        drop(guard);
        output
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, (u64, SharedWork<V>)>> {
        // entries stay consistent even if a holder panicked
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct PendingGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    owner: &'a InFlight<K, V>,
    key: K,
    id: u64,
}

impl<K, V> Drop for PendingGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let mut pending = self.owner.lock();
        if matches!(pending.get(&self.key), Some((id, _)) if *id == self.id) {
            pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn overlapping_calls_share_one_run() {
        let in_flight: Arc<InFlight<&'static str, usize>> = Arc::new(InFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let start = |runs: Arc<AtomicUsize>, release: Arc<Notify>| {
            move || {
                async move {
                    release.notified().await;
                    runs.fetch_add(1, Ordering::SeqCst) + 1
                }
                .boxed()
            }
        };

        let first = {
            let (in_flight, runs, release) = (in_flight.clone(), runs.clone(), release.clone());
            tokio::spawn(async move { in_flight.run("key", start(runs, release)).await })
        };
        while in_flight.is_empty() {
            tokio::task::yield_now().await;
        }
        let second = {
            let (in_flight, runs, release) = (in_flight.clone(), runs.clone(), release.clone());
            tokio::spawn(async move { in_flight.run("key", start(runs, release)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_one();

        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn sequential_calls_run_again() {
        let in_flight: InFlight<u8, u8> = InFlight::new();
        assert_eq!(in_flight.run(1, || async { 10 }.boxed()).await, 10);
        assert_eq!(in_flight.run(1, || async { 20 }.boxed()).await, 20);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn abandoned_work_is_forgotten() {
        let in_flight: InFlight<u8, u8> = InFlight::new();
        let never = in_flight.run(1, || futures::future::pending().boxed());
        assert!(tokio::time::timeout(Duration::from_millis(10), never).await.is_err());
        assert!(in_flight.is_empty());
        assert_eq!(in_flight.run(1, || async { 3 }.boxed()).await, 3);
    }
}
