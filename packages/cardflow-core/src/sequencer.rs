/// Per-entity serialization of move calls.
///
/// A move waits for the in-flight move of the same entity. If another move
/// for that entity is queued while it waits, the waiting one is superseded
/// and never sent: the newer absolute (container, position) subsumes it.
/// The in-flight call always runs to completion. Moves of different
/// entities never wait on each other.
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Lane {
    gate: tokio::sync::Mutex<()>,
    latest: AtomicU64,
}

/// Result of a sequenced call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sequenced<T> {
    Ran(T),
    /// A newer call for the same entity was queued; this one never ran.
    Superseded,
}

pub struct MoveSequencer<K> {
    lanes: Mutex<HashMap<K, Arc<Lane>>>,
}

impl<K> Default for MoveSequencer<K> {
    fn default() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> std::fmt::Debug for MoveSequencer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner()).len();
        f.debug_struct("MoveSequencer")
            .field("lanes", &lanes)
            .finish()
    }
}

impl<K> MoveSequencer<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` once every earlier call for `key` has finished, unless a
    /// newer call for `key` arrives first.
    pub async fn run<F, Fut, T>(&self, key: K, call: F) -> Sequenced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lane = self.lane(&key);
        let ticket = lane.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = {
            let _turn = lane.gate.lock().await;
            if lane.latest.load(Ordering::SeqCst) != ticket {
                log::debug!("[cardflow.sequencer] move for {:?} superseded before sending", key);
                Sequenced::Superseded
            } else {
                Sequenced::Ran(call().await)
            }
        };

        drop(lane);
        self.release(&key);
        outcome
    }

    /// Number of entities with a move in flight or queued.
    pub fn active(&self) -> usize {
        self.lanes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lane(&self, key: &K) -> Arc<Lane> {
        let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());
        lanes
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Lane {
                    gate: tokio::sync::Mutex::new(()),
                    latest: AtomicU64::new(0),
                })
            })
            .clone()
    }

    /// Forget the lane once nobody else holds it.
    fn release(&self, key: &K) {
        let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());
        if lanes.get(key).is_some_and(|lane| Arc::strong_count(lane) == 1) {
            lanes.remove(key);
        }
    }
}
