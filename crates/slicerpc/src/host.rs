//! # Host Exclusivity
//!
//! The calling runtime may only be touched by one task at a time. `Host`
//! models that lock; an `Exclusive` is a claim on it.
//!
//! ## Invariants
//! - Marshaling and unmarshaling happen only while an `Exclusive` holds the lock.
//! - The lock is released only around awaits that do not touch host values
//!   (`Exclusive::allow_threads`).
//! - An `Exclusive` whose `allow_threads` future was dropped mid-await stays
//!   released until `reacquire` runs; `holds` reports which state it is in.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

/// The exclusivity lock of one host runtime.
#[derive(Debug, Clone, Default)]
pub struct Host {
    lock: Arc<Mutex<()>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the host is free and takes it.
    pub async fn enter(&self) -> Exclusive {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        Exclusive { lock: Arc::clone(&self.lock), guard: Some(guard) }
    }

    /// True if some task currently holds the host.
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// A claim on the host lock.
#[derive(Debug)]
pub struct Exclusive {
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Exclusive {
    /// Releases the host while `fut` runs, then takes it back.
    ///
    /// If this future is dropped before `fut` completes, the claim stays
    /// released; the next `reacquire` takes the lock again.
    pub async fn allow_threads<F: Future>(&mut self, fut: F) -> F::Output {
        self.guard = None;
        let output = fut.await;
        self.reacquire().await;
        output
    }

    /// Takes the lock back if an interrupted `allow_threads` left it released.
    pub async fn reacquire(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(Arc::clone(&self.lock).lock_owned().await);
        }
    }

    /// True while this claim actually holds the lock.
    pub fn holds(&self) -> bool {
        self.guard.is_some()
    }
}
