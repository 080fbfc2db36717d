// src/suite/singleflight.rs

//! Per-key memoization with single-flight deduplication.
//!
//! Two tables live behind one mutex:
//! - `done`: finished values, consulted first.
//! - `in_flight`: a watch receiver per key whose work is still running.
//!
//! The first caller for a key registers the in-flight entry *before* any
//! work starts, then spawns the work on its own tokio task. Later callers
//! subscribe to that entry instead of starting again. On completion the
//! `done` entry is installed and the in-flight entry removed under the same
//! lock, so a caller arriving afterwards always hits `done`.
//!
//! Because the work runs on a detached task, dropping the caller that
//! started it does not cancel it; other waiters still get the value.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use tokio::sync::watch;
use tracing::debug;

use crate::errors::Result;

pub struct SingleFlight<K, V> {
    tables: Mutex<Tables<K, V>>,
}

struct Tables<K, V> {
    done: HashMap<K, V>,
    in_flight: HashMap<K, watch::Receiver<Option<V>>>,
}

enum Lookup<V> {
    Done(V),
    Wait(watch::Receiver<Option<V>>),
    Start(watch::Sender<Option<V>>, watch::Receiver<Option<V>>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                done: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Return the memoized value for `key`, running `work` only if no value
    /// exists and nobody else is already computing one.
    ///
    /// `work` is only invoked by the caller that wins the race; it must
    /// produce a `'static` future because it outlives that caller.
    pub async fn get_or_run<F, Fut>(self: &Arc<Self>, key: K, work: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut rx = match self.lookup(&key) {
            Lookup::Done(value) => return Ok(value),
            Lookup::Wait(rx) => {
                debug!(?key, "joining in-flight work");
                rx
            }
            Lookup::Start(tx, rx) => {
                debug!(?key, "starting work");
                let fut = work();
                let this = Arc::clone(self);
                let task_key = key.clone();
                tokio::spawn(async move {
                    let value = fut.await;
                    this.complete(task_key, value.clone());
                    tx.send_replace(Some(value));
                });
                rx
            }
        };

        match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value)
                .clone()
                .ok_or_else(|| anyhow!("in-flight work for {key:?} produced no value").into()),
            Err(_) => Err(anyhow!("in-flight work for {key:?} was aborted").into()),
        }
    }

    fn lookup(&self, key: &K) -> Lookup<V> {
        let mut tables = self.lock();

        if let Some(value) = tables.done.get(key) {
            return Lookup::Done(value.clone());
        }

        if let Some(rx) = tables.in_flight.get(key) {
            return Lookup::Wait(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        tables.in_flight.insert(key.clone(), rx.clone());
        Lookup::Start(tx, rx)
    }

    fn complete(&self, key: K, value: V) {
        let mut tables = self.lock();
        tables.done.insert(key.clone(), value);
        tables.in_flight.remove(&key);
    }

    fn lock(&self) -> MutexGuard<'_, Tables<K, V>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let flight: Arc<SingleFlight<String, usize>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flight
                    .get_or_run("k".to_string(), move || async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        runs.fetch_add(1, Ordering::SeqCst) + 100
                    })
                    .await
                    .unwrap()
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), 100);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.lock().done.get("k"), Some(&100));
        assert!(flight.lock().in_flight.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flight: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
        let a = flight.get_or_run(1, || async { 10 }).await.unwrap();
        let b = flight.get_or_run(2, || async { 20 }).await.unwrap();
        assert_eq!((a, b), (10, 20));
    }

    #[tokio::test]
    async fn late_caller_hits_completed_entry() {
        let flight: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
        flight.get_or_run(1, || async { 10 }).await.unwrap();

        let v = flight.get_or_run(1, || async { 99 }).await.unwrap();
        assert_eq!(v, 10);
    }

    #[tokio::test]
    async fn dropped_leader_does_not_cancel_work() {
        let flight: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());

        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .get_or_run(7, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        70
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        leader.abort();

        let v = flight.get_or_run(7, || async { 99 }).await.unwrap();
        assert_eq!(v, 70);
    }
}
