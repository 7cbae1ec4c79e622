/// Blocking confirmation step gating irreversible deletes. The gateway's
/// delete call must never run unless this returns true.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Approves everything. For non-interactive callers.
pub struct AlwaysConfirm;

impl ConfirmPrompt for AlwaysConfirm {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}
