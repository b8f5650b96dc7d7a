//! Notifications emitted on every committed state change.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use strand_canonical::{ActorId, Digest, PrincipalId, Timestamp};

use crate::intent::IntentId;

/// Direction of a counter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterDirection {
    /// Value went up.
    Increment,
    /// Value went down.
    Decrement,
}

/// Notification emitted after a successful state transition.
///
/// Transport is the sink's business; the kernel only guarantees that a
/// notification is emitted once per successful transition and never for a
/// failed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A new pending branch was registered.
    BranchCreated {
        /// Owning actor.
        actor: ActorId,
        /// Branch token.
        token: u64,
        /// Content reference of the branch payload.
        payload_ref: Digest,
        /// Registration time.
        created_at: Timestamp,
    },
    /// A settlement collapsed an actor's branch set.
    Collapse {
        /// Owning actor.
        actor: ActorId,
        /// Winning token.
        settled: u64,
        /// Tokens discarded by this settlement, ascending.
        discarded: Vec<u64>,
        /// Settlement time.
        resolved_at: Timestamp,
    },
    /// A batch call finished.
    BatchCompleted {
        /// Entries processed, including skipped ones.
        count: usize,
        /// Entries applied.
        settled: usize,
        /// Stale entries skipped.
        skipped: usize,
    },
    /// An intent was stored.
    IntentSubmitted {
        /// Intent id.
        id: IntentId,
        /// Owning actor.
        actor: ActorId,
        /// Branch token.
        token: u64,
    },
    /// An intent was executed.
    IntentExecuted {
        /// Intent id.
        id: IntentId,
        /// Owning actor.
        actor: ActorId,
        /// Branch token.
        token: u64,
        /// Settlement value applied to the volume counter.
        value: U256,
    },
    /// An intent was cancelled.
    IntentCancelled {
        /// Intent id.
        id: IntentId,
        /// Owning actor.
        actor: ActorId,
        /// Branch token.
        token: u64,
    },
    /// A counter changed.
    CounterChanged {
        /// Counter name.
        counter: String,
        /// Direction of the change.
        direction: CounterDirection,
        /// Magnitude of the change.
        delta: U256,
        /// Value after the change.
        value: U256,
    },
    /// A counter was reset by its owner.
    CounterReset {
        /// Counter name.
        counter: String,
        /// Value before the reset.
        previous: U256,
    },
    /// Allow-list membership changed.
    AuthorizationChanged {
        /// Principal whose membership changed.
        principal: PrincipalId,
        /// New membership.
        allowed: bool,
    },
}

impl Notification {
    /// Stable snake_case kind, identical to the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::BranchCreated { .. } => "branch_created",
            Notification::Collapse { .. } => "collapse",
            Notification::BatchCompleted { .. } => "batch_completed",
            Notification::IntentSubmitted { .. } => "intent_submitted",
            Notification::IntentExecuted { .. } => "intent_executed",
            Notification::IntentCancelled { .. } => "intent_cancelled",
            Notification::CounterChanged { .. } => "counter_changed",
            Notification::CounterReset { .. } => "counter_reset",
            Notification::AuthorizationChanged { .. } => "authorization_changed",
        }
    }

    /// Actor the notification concerns, if any.
    pub fn actor(&self) -> Option<&ActorId> {
        match self {
            Notification::BranchCreated { actor, .. }
            | Notification::Collapse { actor, .. }
            | Notification::IntentSubmitted { actor, .. }
            | Notification::IntentExecuted { actor, .. }
            | Notification::IntentCancelled { actor, .. } => Some(actor),
            _ => None,
        }
    }
}
