//! Polling session: a cancellable periodic refresh bound to one view.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle ──start──► Running ──stop──────────► Idle
//!     ▲               │ │
//!     │               │ └──refresh settles──► Idle
//!     └───────────────┘
//!   (start while Running replaces the timer)
//! ```
//!
//! A failed refresh is logged and the schedule continues. After [`PollingSession::stop`]
//! returns, the refresh function is never invoked again: every invocation holds the
//! session's invocation gate while it checks the generation, and `stop` takes the gate
//! too. State queries only take the state lock, so a refresh function may call
//! [`PollingSession::state`] from its synchronous part.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::ClientError;

/// What a refresh reports back to its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollControl {
    /// Keep polling.
    Continue,
    /// The view reached a final state; the session stops itself.
    Settle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState { Idle, Running }

type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, Result<PollControl, ClientError>> + Send + Sync>;

#[derive(Default)]
struct Slot {
    generation: u64,
    refresh: Option<RefreshFn>,
    task: Option<JoinHandle<()>>,
}

impl Slot {
    fn cancel(&mut self) -> bool {
        self.generation += 1;
        self.refresh = None;
        match self.task.take() {
            Some(task) => { task.abort(); true }
            None => false,
        }
    }
}

/// Shortest accepted period; `interval_at` rejects zero.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Shared {
    name: String,
    slot: Mutex<Slot>,
    /// Held while a refresh function is being called and while the generation changes.
    gate: Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> { self.slot.lock().unwrap_or_else(PoisonError::into_inner) }
    fn gate(&self) -> MutexGuard<'_, ()> { self.gate.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Calls the refresh function while the session runs, and only for `generation`
    /// when one is given. Returns the generation the call belongs to.
    fn invoke(&self, generation: Option<u64>) -> Option<(u64, BoxFuture<'static, Result<PollControl, ClientError>>)> {
        let _gate = self.gate();
        let (live, refresh) = {
            let slot = self.lock();
            if slot.task.is_none() || generation.is_some_and(|g| g != slot.generation) { return None; }
            (slot.generation, Arc::clone(slot.refresh.as_ref()?))
        };
        Some((live, refresh()))
    }

    /// Applies a refresh outcome. Returns true when the session ended.
    fn settle(&self, generation: u64, outcome: Result<PollControl, ClientError>) -> bool {
        match outcome {
            Ok(PollControl::Continue) => false,
            Ok(PollControl::Settle) => {
                let _gate = self.gate();
                let mut slot = self.lock();
                if slot.generation == generation {
                    slot.cancel();
                    info!(session = %self.name, "view settled, polling stopped");
                }
                true
            }
            Err(e) => {
                warn!(session = %self.name, error = %e, "refresh failed, will retry on next tick");
                false
            }
        }
    }
}

/// Owner handle of one polling timer. Dropping it stops the timer.
pub struct PollingSession {
    shared: Arc<Shared>,
}

impl PollingSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared { name: name.into(), slot: Mutex::new(Slot::default()), gate: Mutex::new(()) }),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.shared.lock().task.is_some() { SessionState::Running } else { SessionState::Idle }
    }

    pub fn is_running(&self) -> bool { self.state() == SessionState::Running }

    /// Starts polling every `period`, first call one period from now.
    /// Any previous timer of this session is cancelled first. A zero period is
    /// raised to [`MIN_PERIOD`].
    ///
    /// Must be called from within a tokio runtime. `refresh` must not call
    /// `start`, `stop` or `refresh_now` on this session before returning its
    /// future; doing so from inside the future is fine.
    pub fn start<F, Fut>(&self, period: Duration, refresh: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollControl, ClientError>> + Send + 'static,
    {
        let period = if period < MIN_PERIOD {
            warn!(session = %self.shared.name, period_ms = period.as_millis() as u64, "polling period too short, using 1ms");
            MIN_PERIOD
        } else {
            period
        };
        let refresh: RefreshFn = Arc::new(move || Box::pin(refresh()));
        let _gate = self.shared.gate();
        let mut slot = self.shared.lock();
        if slot.cancel() {
            debug!(session = %self.shared.name, "restarting, previous timer cancelled");
        }
        slot.refresh = Some(refresh);
        let generation = slot.generation;
        slot.task = Some(tokio::spawn(run(Arc::clone(&self.shared), generation, period)));
        info!(session = %self.shared.name, period_ms = period.as_millis() as u64, "polling started");
    }

    /// Cancels the timer. Safe to call when idle.
    pub fn stop(&self) {
        let _gate = self.shared.gate();
        if self.shared.lock().cancel() {
            info!(session = %self.shared.name, "polling stopped");
        }
    }

    /// One immediate refresh outside the schedule, e.g. when the window regains focus.
    /// Ignored while idle. Returns whether a refresh was issued.
    pub fn refresh_now(&self) -> bool {
        let Some((generation, fut)) = self.shared.invoke(None) else { return false };
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.settle(generation, fut.await);
        });
        debug!(session = %self.shared.name, "out-of-band refresh issued");
        true
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) { self.stop(); }
}

async fn run(shared: Arc<Shared>, generation: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some((_, fut)) = shared.invoke(Some(generation)) else { return };
        if shared.settle(generation, fut.await) { return; }
    }
}
