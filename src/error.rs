use crate::gateway::GatewayError;
use crate::models::Id;

/// Failures surfaced by the controllers. None of these are fatal: every
/// failure is scoped to the single user action that triggered it, and the
/// previously rendered state stays intact.
#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    /// Zero rows where exactly one was expected.
    #[error("not found")]
    NotFound,
    /// Part of the taxonomy for completeness, but the controllers never
    /// construct it: invalid input (empty title or content) degrades to a
    /// local no-op before any network call instead of erroring.
    #[error("validation: {0}")]
    Validation(&'static str),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
    /// The thread insert succeeded but its first post insert failed, leaving
    /// a thread with zero posts behind. No compensating rollback is
    /// attempted; callers get the orphaned thread id.
    #[error("thread {thread_id} created but its first post failed: {source}")]
    PartialCreation { thread_id: Id, source: GatewayError },
}

pub type BoardResult<T> = Result<T, BoardError>;
