//! Progress notification and the busy state machine

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives busy transitions and activity lines from the engine.
///
/// Calls happen synchronously on the thread running the operation.
pub trait EngineObserver: Send + Sync {
    fn on_busy_changed(&self, busy: bool);

    fn on_event(&self, message: &str);
}

/// Forwards notifications to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn on_busy_changed(&self, busy: bool) {
        tracing::debug!(busy, "engine busy state changed");
    }

    fn on_event(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Engine activity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Busy,
}

/// Idle/Busy state shared by everything holding a clone.
///
/// Entering while busy fails with [`Error::Busy`] rather than queueing.
#[derive(Clone)]
pub struct BusyState {
    state: Arc<Mutex<EngineState>>,
    observer: Arc<dyn EngineObserver>,
}

impl BusyState {
    pub fn new(observer: Arc<dyn EngineObserver>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::Idle)),
            observer,
        }
    }

    pub fn current(&self) -> EngineState {
        *self.state.lock()
    }

    /// Move Idle -> Busy, returning a guard that moves back on drop.
    pub fn enter(&self) -> Result<BusyGuard<'_>> {
        {
            let mut state = self.state.lock();
            if *state == EngineState::Busy {
                return Err(Error::Busy);
            }
            *state = EngineState::Busy;
        }
        self.observer.on_busy_changed(true);
        Ok(BusyGuard { owner: self })
    }
}

/// Holds the engine Busy until dropped, including on early return or panic unwind.
pub struct BusyGuard<'a> {
    owner: &'a BusyState,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.owner.state.lock() = EngineState::Idle;
        self.owner.observer.on_busy_changed(false);
    }
}
