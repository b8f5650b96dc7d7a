//! Error types for core operations.

use strand_canonical::{ActorId, ContentIdError, PrincipalId};
use thiserror::Error;

use crate::branch::BranchState;
use crate::intent::IntentId;

/// Core error types.
///
/// Every public operation is all-or-nothing: when one of these is returned
/// no state change is observable.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Token is stale for registration, or unknown for settlement.
    #[error("invalid token {token} for {actor} (last settled {last_settled})")]
    InvalidToken {
        /// Actor whose branch set was addressed.
        actor: ActorId,
        /// Offending token.
        token: u64,
        /// The actor's last settled token at the time of the call.
        last_settled: u64,
    },
    /// Token is at or below the actor's last settled token.
    #[error("token {token} for {actor} is already settled (last settled {last_settled})")]
    AlreadySettled {
        /// Actor whose branch set was addressed.
        actor: ActorId,
        /// Offending token.
        token: u64,
        /// The actor's last settled token at the time of the call.
        last_settled: u64,
    },
    /// The branch for `(actor, token)` already carries a different payload.
    #[error("branch {token} for {actor} is bound to a different payload")]
    BranchConflict {
        /// Actor whose branch set was addressed.
        actor: ActorId,
        /// Offending token.
        token: u64,
    },
    /// Execution requires a settled branch and the branch is not settled.
    #[error("branch {token} for {actor} is {state:?}, not settled")]
    BranchNotSettled {
        /// Actor owning the branch.
        actor: ActorId,
        /// Branch token.
        token: u64,
        /// Observed state (`None` when the branch is missing).
        state: Option<BranchState>,
    },
    /// Intent was already executed or cancelled.
    #[error("intent {id} already processed")]
    AlreadyProcessed {
        /// Intent id.
        id: IntentId,
    },
    /// Caller lacks permission.
    #[error("{principal} is not authorized for this operation")]
    NotAuthorized {
        /// Rejected caller.
        principal: PrincipalId,
    },
    /// Intent id is already stored.
    #[error("intent {id} already exists")]
    IntentAlreadyExists {
        /// Intent id.
        id: IntentId,
    },
    /// Intent id is unknown.
    #[error("intent {id} not found")]
    IntentNotFound {
        /// Intent id.
        id: IntentId,
    },
    /// Batch input is structurally invalid (empty or length mismatch).
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    /// Counter overflow or underflow.
    #[error("arithmetic error on counter {counter}: {reason}")]
    Arithmetic {
        /// Counter name.
        counter: String,
        /// `overflow` or `underflow`.
        reason: &'static str,
    },
    /// Intent id computation failed.
    #[error("content id computation failed: {0}")]
    ContentId(#[from] ContentIdError),
    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
