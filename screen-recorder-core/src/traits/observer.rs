use crate::models::diagnostics::ProgressUpdate;
use crate::models::error::StreamError;
use crate::models::manifest::OutputManifest;
use crate::models::phase::SessionPhase;

/// Event delegate for session notifications.
///
/// Methods are called from whichever thread caused the event: the control
/// thread for commands, a capture delivery thread for stream failures, or
/// the progress ticker. Never called while session state is locked.
/// Implementations should marshal to a UI thread if needed.
pub trait SessionObserver: Send + Sync {
    /// Called after every accepted phase transition.
    fn on_phase_changed(&self, from: SessionPhase, to: SessionPhase);

    /// Called periodically while recording or paused.
    fn on_progress(&self, progress: &ProgressUpdate);

    /// Called once when the session enters `failed`.
    fn on_failure(&self, error: &StreamError);

    /// Called when a stop completes and the tracks are finalized.
    fn on_session_finished(&self, manifest: &OutputManifest);
}
