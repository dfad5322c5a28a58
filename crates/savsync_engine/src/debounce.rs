//! Debounced background worker.
//!
//! Any number of external notifiers share one single-slot signal with one
//! worker thread. A burst of notifications close together produces one
//! sweep; notifications arriving while a sweep runs produce exactly one
//! more sweep after it, never a queue of them.

use crate::engine::SyncEngine;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default settle time for a burst of notifications.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Single-slot "a sweep is owed" signal.
///
/// The slot holds `true` once the worker has consumed the request and
/// `false` while one is pending. It starts pending so the worker's first
/// iteration performs the initial full sweep with no external trigger.
pub struct SweepSignal {
    handled: Mutex<bool>,
    condvar: Condvar,
}

impl SweepSignal {
    /// Creates a signal with a sweep already owed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Marks a sweep as owed and wakes the worker.
    pub fn raise(&self) {
        *self.handled.lock() = false;
        self.condvar.notify_one();
    }

    /// Blocks until a sweep is owed.
    pub fn wait_raised(&self) {
        let mut handled = self.handled.lock();
        while *handled {
            self.condvar.wait(&mut handled);
        }
    }

    /// Atomically consumes the slot.
    ///
    /// Returns `true` when a fresh request was pending, `false` when the
    /// slot had already been consumed.
    pub fn consume(&self) -> bool {
        let mut handled = self.handled.lock();
        let fresh = !*handled;
        *handled = true;
        fresh
    }
}

impl Default for SweepSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the background worker and coalesces change notifications into
/// minimal full sweeps.
pub struct Debouncer {
    engine: Arc<SyncEngine>,
    signal: Arc<SweepSignal>,
    delay: Duration,
    started: AtomicBool,
}

impl Debouncer {
    /// Creates a debouncer around an engine with the default settle delay.
    #[must_use]
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            signal: Arc::new(SweepSignal::new()),
            delay: DEFAULT_DEBOUNCE,
            started: AtomicBool::new(false),
        }
    }

    /// Overrides the settle delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the shared engine.
    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Requests a sweep.
    ///
    /// Safe to call from any thread, any number of times; rapid calls while
    /// a sweep runs coalesce into exactly one additional sweep.
    pub fn notify(&self) {
        self.signal.raise();
    }

    /// Starts the worker thread. Idempotent.
    ///
    /// The worker immediately performs an initial full sweep, then blocks
    /// until notified. It never terminates; there is no cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(&self) -> std::io::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let engine = Arc::clone(&self.engine);
        let signal = Arc::clone(&self.signal);
        let delay = self.delay;

        let spawned = std::thread::Builder::new()
            .name("savsync-sweeper".into())
            .spawn(move || worker_loop(&engine, &signal, delay));

        match spawned {
            Ok(_) => {
                info!("sweep worker started");
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

fn worker_loop(engine: &SyncEngine, signal: &SweepSignal, delay: Duration) {
    loop {
        signal.wait_raised();

        // Let the rest of a burst land; one logical save event can touch
        // several files in quick succession.
        std::thread::sleep(delay);

        // Consume-and-sweep until no new request arrived during the sweep.
        while signal.consume() {
            let report = engine.sweep_all();
            debug!(?report, "worker sweep complete");
            if report.needs_resweep() {
                signal.raise();
            }
        }
    }
}
