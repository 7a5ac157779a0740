use crate::models::config::RecordingOptions;

/// Screen/audio capture permission check, consulted before a session
/// touches any state.
pub trait AuthorizationGate: Send + Sync {
    fn is_authorized(&self, options: &RecordingOptions) -> bool;
}

/// Gate for platforms without a permission model.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAuthorized;

impl AuthorizationGate for AlwaysAuthorized {
    fn is_authorized(&self, _options: &RecordingOptions) -> bool {
        true
    }
}

impl<F> AuthorizationGate for F
where
    F: Fn(&RecordingOptions) -> bool + Send + Sync,
{
    fn is_authorized(&self, options: &RecordingOptions) -> bool {
        self(options)
    }
}
