use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::models::error::{StateError, StreamError};
use crate::models::phase::SessionPhase;
use crate::models::sample::{MediaKind, Sample};
use crate::models::state::{Admission, OutputPaths, RecordingState};
use crate::session::clock::Clock;
use crate::session::events::{EventBus, SessionEvent};

static NEXT_STORE_ID: AtomicUsize = AtomicUsize::new(1);

#[cfg(debug_assertions)]
thread_local! {
    static ENTERED_STORES: std::cell::RefCell<Vec<usize>> = const { std::cell::RefCell::new(Vec::new()) };
}

/// Single owner of `RecordingState`.
///
/// Every read and write goes through one `parking_lot::Mutex`. The mutex is
/// not reentrant: a `mutate` body must work on the `&mut RecordingState` it
/// is given and never call back into the store. Debug builds turn such a
/// re-entry into a panic instead of a deadlock.
///
/// Phase changes are published on the event bus after the lock is released,
/// so two threads changing phase at once may deliver their events in either
/// order. Each `PhaseChanged` carries the transition sequence number it was
/// applied under.
pub struct RecordingStateStore {
    id: usize,
    state: Mutex<RecordingState>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
}

impl RecordingStateStore {
    pub fn new(history_capacity: usize, clock: Arc<dyn Clock>, events: Arc<EventBus>) -> Self {
        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(RecordingState::new(history_capacity)),
            clock,
            events,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Immutable copy of the current state.
    pub fn snapshot(&self) -> RecordingState {
        self.enter().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.enter().phase
    }

    /// Apply one state-machine edge. Illegal edges are rejected with no side effect.
    pub fn transition(&self, to: SessionPhase) -> Result<(), StateError> {
        let now = self.clock.now();
        self.mutate(|state| state.apply_transition(to, now))
            .inspect_err(|e| log::warn!("Rejected session transition: {}", e))
    }

    /// Apply several field updates as one atomic unit.
    ///
    /// `body` runs inside the store's critical section. It must not call any
    /// method on this store.
    pub fn mutate<R>(&self, body: impl FnOnce(&mut RecordingState) -> R) -> R {
        let (from, to, seq_before, seq, result) = {
            let mut guard = self.enter();
            let (from, seq_before) = (guard.phase, guard.transition_seq);
            let result = body(&mut guard);
            (from, guard.phase, seq_before, guard.transition_seq, result)
        };

        if seq != seq_before {
            log::debug!("Session phase {} -> {} (#{})", from, to, seq);
            self.events.publish(SessionEvent::PhaseChanged { from, to, seq });
        }
        result
    }

    /// Insert into the recent-timestamp history; `false` means the
    /// timestamp was already present.
    pub fn record_presentation_timestamp(&self, kind: MediaKind, pts: Duration) -> bool {
        self.enter().record_presentation_timestamp(kind, pts)
    }

    /// Completeness, duplicate and phase checks for one sample, in one critical section.
    pub fn admit(&self, kind: MediaKind, sample: &Sample) -> Admission {
        self.enter().admit(kind, sample)
    }

    pub fn assign_output_paths(&self, paths: OutputPaths) -> Result<(), StateError> {
        self.mutate(|state| state.assign_output_paths(paths))
    }

    /// Enter `failed` and record the cause. Returns the phase that was left.
    pub fn fail(&self, error: StreamError) -> Result<SessionPhase, StateError> {
        let now = self.clock.now();
        self.mutate(|state| {
            let from = state.phase;
            state.apply_transition(SessionPhase::Failed, now)?;
            state.last_error = Some(error);
            Ok(from)
        })
    }

    /// Active recording time at the current clock reading.
    pub fn active_duration(&self) -> Duration {
        let now = self.clock.now();
        self.enter().active_duration(now)
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    fn enter(&self) -> EnteredState<'_> {
        #[cfg(debug_assertions)]
        ENTERED_STORES.with(|entered| {
            let mut entered = entered.borrow_mut();
            if entered.contains(&self.id) {
                panic!("RecordingStateStore re-entered from inside its own critical section");
            }
            entered.push(self.id);
        });

        EnteredState {
            id: self.id,
            guard: self.state.lock(),
        }
    }
}

/// Lock guard that also tracks per-thread entry in debug builds.
struct EnteredState<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    id: usize,
    guard: MutexGuard<'a, RecordingState>,
}

impl std::ops::Deref for EnteredState<'_> {
    type Target = RecordingState;

    fn deref(&self) -> &RecordingState {
        &self.guard
    }
}

impl std::ops::DerefMut for EnteredState<'_> {
    fn deref_mut(&mut self) -> &mut RecordingState {
        &mut self.guard
    }
}

impl Drop for EnteredState<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        ENTERED_STORES.with(|entered| {
            let mut entered = entered.borrow_mut();
            if let Some(pos) = entered.iter().rposition(|id| *id == self.id) {
                entered.remove(pos);
            }
        });
    }
}
