//! Deduplication of concurrent identical computations.

use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};

/// Collapses concurrent calls for the same key into one execution.
///
/// The first caller for a key runs the closure; callers arriving while it
/// is in flight block and receive a clone of the same outcome. The flight
/// entry is dropped on completion, so a later call starts fresh — failed
/// outcomes are handed to every waiter but never remembered.
pub struct SingleFlight<K, V> {
    flights: Mutex<AHashMap<K, Arc<Flight<V>>>>,
}

struct Flight<V> {
    outcome: Mutex<Option<V>>,
    done: Condvar,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        SingleFlight {
            flights: Mutex::new(AHashMap::new()),
        }
    }

    /// Run `f` for `key`, or wait for the in-flight execution and share
    /// its outcome.
    pub fn work(&self, key: K, f: impl FnOnce() -> V) -> V {
        let (flight, leader) = {
            let mut flights = self.flights.lock();
            match flights.get(&key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight {
                        outcome: Mutex::new(None),
                        done: Condvar::new(),
                    });
                    flights.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            let mut outcome = flight.outcome.lock();
            loop {
                if let Some(value) = outcome.as_ref() {
                    return value.clone();
                }
                flight.done.wait(&mut outcome);
            }
        }

        let value = f();

        // Unregister before publishing so a caller that misses the outcome
        // starts a fresh flight instead of waiting on a finished one.
        self.flights.lock().remove(&key);
        *flight.outcome.lock() = Some(value.clone());
        flight.done.notify_all();
        value
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
