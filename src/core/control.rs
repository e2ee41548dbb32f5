//! Coordination state shared by the desks, the monitor and the shutdown coordinator
//!
//! Created once by the server and handed to every thread behind an `Arc`.
//! Desks only ever read it at their safe points; they never act on it in the
//! middle of a command.
//!
//! # Balance query gate
//!
//! A query is identified by a generation number. The monitor opens a
//! generation, each desk answers it at most once and then waits on the gate
//! until the monitor closes it again. This replaces the `query` / `cont`
//! polling pair with a condition variable.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct QueryState {
    generation: u64,
    in_progress: bool,
}

/// Shutdown flag and balance-query gate
#[derive(Debug, Default)]
pub struct Control {
    shutdown: AtomicBool,
    query: Mutex<QueryState>,
    released: Condvar,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every desk to drain at its next safe point
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Open a new query generation and return its number
    pub fn begin_query(&self) -> u64 {
        let mut query = self.query.lock();
        query.generation += 1;
        query.in_progress = true;
        query.generation
    }

    /// Close `generation` and release every desk waiting on it
    pub fn end_query(&self, generation: u64) {
        let mut query = self.query.lock();
        if query.generation == generation {
            query.in_progress = false;
        }
        drop(query);
        self.released.notify_all();
    }

    /// The open generation, unless the caller already answered it
    pub fn pending_query(&self, last_answered: u64) -> Option<u64> {
        let query = self.query.lock();
        (query.in_progress && query.generation != last_answered).then_some(query.generation)
    }

    /// Block until `generation` is closed
    pub fn wait_released(&self, generation: u64) {
        let mut query = self.query.lock();
        while query.in_progress && query.generation == generation {
            self.released.wait(&mut query);
        }
    }
}
