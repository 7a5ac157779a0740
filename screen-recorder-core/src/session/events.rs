use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::models::diagnostics::ProgressUpdate;
use crate::models::error::StreamError;
use crate::models::manifest::OutputManifest;
use crate::models::phase::SessionPhase;
use crate::traits::observer::SessionObserver;

/// Notification emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `seq` is the store's transition count after the change. Events are
    /// delivered outside the store lock, so concurrent changes can arrive
    /// out of order; `seq` gives the order they were applied in.
    PhaseChanged { from: SessionPhase, to: SessionPhase, seq: u64 },
    Progress(ProgressUpdate),
    Failed(StreamError),
    Finished(OutputManifest),
}

/// Fan-out of session events to observers and channel subscribers.
///
/// Consumers only observe; nothing here feeds back into session state.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: SessionEvent) {
        // Snapshot observers so callbacks may register more without deadlocking.
        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        for observer in &observers {
            match &event {
                SessionEvent::PhaseChanged { from, to, .. } => observer.on_phase_changed(*from, *to),
                SessionEvent::Progress(progress) => observer.on_progress(progress),
                SessionEvent::Failed(error) => observer.on_failure(error),
                SessionEvent::Finished(manifest) => observer.on_session_finished(manifest),
            }
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
