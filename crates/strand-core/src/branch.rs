//! Branch records and the per-actor branch set.
//!
//! A `BranchSet` holds one actor's branches and its settlement
//! watermark. The collapse itself is a pure transition over that set; the
//! registry supplies locking and notifications.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strand_canonical::{ActorId, Digest, Timestamp};

use crate::errors::CoreError;

/// Lifecycle state of a branch. Anything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchState {
    /// Registered, not yet resolved.
    Pending,
    /// Won a settlement.
    Settled,
    /// Lost to a settlement of a higher token.
    Discarded,
}

impl BranchState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        !matches!(self, BranchState::Pending)
    }
}

/// A speculative, uniquely numbered candidate operation for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Owning actor.
    pub actor: ActorId,
    /// Token, unique within the actor.
    pub token: u64,
    /// Content reference of the payload this branch stands for.
    pub payload_ref: Digest,
    /// Current state.
    pub state: BranchState,
    /// Registration time.
    pub created_at: Timestamp,
    /// Settlement time, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
}

/// Outcome of a registration attempt that passed validation.
#[derive(Debug)]
pub(crate) enum Registration {
    /// A new pending branch.
    Created(Branch),
    /// The `(actor, token)` pair already existed.
    Existing,
}

/// One actor's branches plus its settlement watermark.
///
/// `pending` indexes the tokens still in `Pending`, so settlement only
/// touches the branches it discards and reads never filter the full map.
#[derive(Debug, Default)]
pub(crate) struct BranchSet {
    pub(crate) last_settled: u64,
    branches: BTreeMap<u64, Branch>,
    pending: BTreeSet<u64>,
}

impl BranchSet {
    pub(crate) fn get(&self, token: u64) -> Option<&Branch> {
        self.branches.get(&token)
    }

    pub(crate) fn contains(&self, token: u64) -> bool {
        self.branches.contains_key(&token)
    }

    pub(crate) fn pending(&self) -> impl Iterator<Item = u64> + '_ {
        self.pending.iter().copied()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    /// Registers `token`. With `exclusive_payload`, an existing branch bound
    /// to another payload is a conflict instead of a no-op.
    pub(crate) fn register(
        &mut self,
        actor: &ActorId,
        token: u64,
        payload_ref: Digest,
        exclusive_payload: bool,
        now: &Timestamp,
    ) -> Result<Registration, CoreError> {
        if token <= self.last_settled {
            return Err(CoreError::InvalidToken {
                actor: actor.clone(),
                token,
                last_settled: self.last_settled,
            });
        }
        if let Some(existing) = self.branches.get(&token) {
            if exclusive_payload && existing.payload_ref != payload_ref {
                return Err(CoreError::BranchConflict {
                    actor: actor.clone(),
                    token,
                });
            }
            return Ok(Registration::Existing);
        }
        let branch = Branch {
            actor: actor.clone(),
            token,
            payload_ref,
            state: BranchState::Pending,
            created_at: now.clone(),
            resolved_at: None,
        };
        self.branches.insert(token, branch.clone());
        self.pending.insert(token);
        Ok(Registration::Created(branch))
    }

    /// Checks that `token` can be settled now.
    pub(crate) fn check_settle(&self, actor: &ActorId, token: u64) -> Result<(), CoreError> {
        if !self.branches.contains_key(&token) {
            return Err(CoreError::InvalidToken {
                actor: actor.clone(),
                token,
                last_settled: self.last_settled,
            });
        }
        if token <= self.last_settled {
            return Err(CoreError::AlreadySettled {
                actor: actor.clone(),
                token,
                last_settled: self.last_settled,
            });
        }
        Ok(())
    }

    /// Settles `token`, discarding every pending token below it.
    ///
    /// Callers must have passed [`check_settle`](Self::check_settle) under
    /// the same lock. Returns the discarded tokens, ascending.
    pub(crate) fn collapse(&mut self, token: u64, now: &Timestamp) -> Vec<u64> {
        let discarded: Vec<u64> = self.pending.range(..token).copied().collect();
        for t in &discarded {
            self.pending.remove(t);
            self.resolve(*t, BranchState::Discarded, now);
        }
        self.pending.remove(&token);
        self.resolve(token, BranchState::Settled, now);
        self.last_settled = token;
        discarded
    }

    fn resolve(&mut self, token: u64, state: BranchState, now: &Timestamp) {
        if let Some(branch) = self.branches.get_mut(&token) {
            branch.state = state;
            branch.resolved_at = Some(now.clone());
        }
    }
}
