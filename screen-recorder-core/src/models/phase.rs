use std::fmt;

use serde::{Deserialize, Serialize};

/// Recording session phase.
///
/// Transitions:
/// ```text
/// idle → preparing → recording ↔ paused
///            ↓           ↓         ↓
///          failed     stopping ← ──┘
///            ↓           ↓
///          idle        idle
/// ```
/// `recording` and `paused` may also fail on a stream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Preparing,
    Recording,
    Paused,
    Stopping,
    Failed,
}

impl SessionPhase {
    /// Whether `self -> to` is an edge of the session state machine.
    pub fn can_transition_to(self, to: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, to),
            (Idle, Preparing)
                | (Preparing, Recording)
                | (Preparing, Failed)
                | (Recording, Paused)
                | (Paused, Recording)
                | (Recording, Stopping)
                | (Paused, Stopping)
                | (Stopping, Idle)
                | (Recording, Failed)
                | (Paused, Failed)
                | (Failed, Idle)
        )
    }

    /// Phases in which the capture stream is live.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Recording | Self::Paused | Self::Stopping)
    }

    pub fn is_recording(self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
