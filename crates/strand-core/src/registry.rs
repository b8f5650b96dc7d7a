//! Per-actor branch registry and the settlement collapse.

use std::collections::HashMap;
use std::sync::Arc;

use strand_canonical::{ActorId, Digest, Timestamp};
use tracing::{debug, info};

use crate::auth::CallContext;
use crate::branch::{Branch, BranchSet, BranchState, Registration};
use crate::clock::Clock;
use crate::errors::CoreError;
use crate::events::Notification;
use crate::shard::ShardedMap;
use crate::sink::SharedSink;

/// What happened to one entry of a batch settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry settled; carries the tokens it discarded.
    Settled {
        /// Discarded tokens, ascending.
        discarded: Vec<u64>,
    },
    /// The token was already at or below the actor's last settled token.
    Skipped,
}

/// Store of speculative branches, one branch set per actor.
///
/// Each actor's set lives in exactly one shard, so every operation on one
/// actor is atomic for every reader, while actors in different shards never
/// wait on each other.
pub struct BranchRegistry {
    sets: ShardedMap<ActorId, BranchSet>,
    sink: SharedSink,
    clock: Arc<dyn Clock>,
}

impl BranchRegistry {
    /// Creates an empty registry.
    pub fn new(shard_count: usize, sink: SharedSink, clock: Arc<dyn Clock>) -> Self {
        Self {
            sets: ShardedMap::new(shard_count),
            sink,
            clock,
        }
    }

    /// Registers a pending branch for `(actor, token)`.
    ///
    /// Re-registering an existing pair is a silent no-op success.
    pub fn register_branch(
        &self,
        ctx: &CallContext<'_>,
        actor: &ActorId,
        token: u64,
        payload_ref: Digest,
    ) -> Result<(), CoreError> {
        ctx.ensure_actor_or_authorized(actor)?;
        self.register(actor, token, payload_ref, false)
    }

    /// Registration for intents: an existing branch must carry the same payload.
    pub(crate) fn register_exclusive(
        &self,
        ctx: &CallContext<'_>,
        actor: &ActorId,
        token: u64,
        payload_ref: Digest,
    ) -> Result<(), CoreError> {
        ctx.ensure_actor_or_authorized(actor)?;
        self.register(actor, token, payload_ref, true)
    }

    fn register(
        &self,
        actor: &ActorId,
        token: u64,
        payload_ref: Digest,
        exclusive_payload: bool,
    ) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut shard = self.sets.lock(actor);
        let registration = match shard.get_mut(actor) {
            Some(set) => set.register(actor, token, payload_ref, exclusive_payload, &now)?,
            None => {
                let mut set = BranchSet::default();
                let registration =
                    set.register(actor, token, payload_ref, exclusive_payload, &now)?;
                shard.insert(actor.clone(), set);
                registration
            }
        };
        if let Registration::Created(branch) = registration {
            debug!(actor = %actor, token, "branch registered");
            self.sink.emit(Notification::BranchCreated {
                actor: branch.actor,
                token: branch.token,
                payload_ref: branch.payload_ref,
                created_at: branch.created_at,
            });
        }
        Ok(())
    }

    /// Settles `(actor, token)`: the branch becomes `Settled`, every pending
    /// branch below it becomes `Discarded`, and higher branches stay pending.
    ///
    /// Returns the discarded tokens in ascending order.
    pub fn settle(
        &self,
        ctx: &CallContext<'_>,
        actor: &ActorId,
        token: u64,
    ) -> Result<Vec<u64>, CoreError> {
        ctx.ensure_actor_or_authorized(actor)?;
        let mut shard = self.sets.lock(actor);
        let set = match shard.get_mut(actor) {
            Some(set) => set,
            None => {
                return Err(CoreError::InvalidToken {
                    actor: actor.clone(),
                    token,
                    last_settled: 0,
                })
            }
        };
        set.check_settle(actor, token)?;
        let now = self.clock.now();
        let discarded = set.collapse(token, &now);
        self.announce_collapse(actor, token, &discarded, now);
        Ok(discarded)
    }

    /// Settles a batch with every touched shard held for the whole call.
    ///
    /// The batch is validated against a simulated watermark first, so an
    /// unknown fresh token aborts it before anything changes. Stale entries,
    /// including ones made stale by an earlier entry, are skipped.
    pub(crate) fn settle_batch(
        &self,
        pairs: &[(ActorId, u64)],
    ) -> Result<Vec<EntryOutcome>, CoreError> {
        let mut shards = self.sets.lock_many(pairs.iter().map(|(actor, _)| actor));

        let mut watermark: HashMap<&ActorId, u64> = HashMap::new();
        let mut plan = Vec::with_capacity(pairs.len());
        for (actor, token) in pairs {
            let set = shards.get(actor);
            let last_settled = match watermark.get(actor) {
                Some(&last) => last,
                None => set.map_or(0, |s| s.last_settled),
            };
            if *token <= last_settled {
                plan.push(false);
                continue;
            }
            if !set.is_some_and(|s| s.contains(*token)) {
                return Err(CoreError::InvalidToken {
                    actor: actor.clone(),
                    token: *token,
                    last_settled,
                });
            }
            watermark.insert(actor, *token);
            plan.push(true);
        }

        let now = self.clock.now();
        let mut outcomes = Vec::with_capacity(pairs.len());
        for ((actor, token), apply) in pairs.iter().zip(plan) {
            match shards.get_mut(actor) {
                Some(set) if apply => {
                    let discarded = set.collapse(*token, &now);
                    self.announce_collapse(actor, *token, &discarded, now.clone());
                    outcomes.push(EntryOutcome::Settled { discarded });
                }
                _ => outcomes.push(EntryOutcome::Skipped),
            }
        }
        Ok(outcomes)
    }

    fn announce_collapse(
        &self,
        actor: &ActorId,
        token: u64,
        discarded: &[u64],
        resolved_at: Timestamp,
    ) {
        info!(actor = %actor, token, discarded = discarded.len(), "branch set collapsed");
        self.sink.emit(Notification::Collapse {
            actor: actor.clone(),
            settled: token,
            discarded: discarded.to_vec(),
            resolved_at,
        });
    }

    /// Copy of the branch at `(actor, token)`.
    pub fn get_branch(&self, actor: &ActorId, token: u64) -> Option<Branch> {
        self.sets.lock(actor).get(actor)?.get(token).cloned()
    }

    /// State of the branch at `(actor, token)`.
    pub fn branch_state(&self, actor: &ActorId, token: u64) -> Option<BranchState> {
        Some(self.sets.lock(actor).get(actor)?.get(token)?.state)
    }

    /// Whether `actor` has any pending branch.
    pub fn has_pending(&self, actor: &ActorId) -> bool {
        self.sets
            .lock(actor)
            .get(actor)
            .is_some_and(|s| s.has_pending())
    }

    /// Pending tokens of `actor`, ascending.
    pub fn list_pending(&self, actor: &ActorId) -> Vec<u64> {
        self.sets
            .lock(actor)
            .get(actor)
            .map(|s| s.pending().collect())
            .unwrap_or_default()
    }

    /// Highest settled token of `actor` (0 before the first settlement).
    pub fn last_settled(&self, actor: &ActorId) -> u64 {
        self.sets
            .lock(actor)
            .get(actor)
            .map_or(0, |s| s.last_settled)
    }

    /// Every branch of `actor` in any state, ascending by token.
    pub fn list_branches(&self, actor: &ActorId) -> Vec<Branch> {
        self.sets
            .lock(actor)
            .get(actor)
            .map(|s| s.branches().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of actors that own at least one branch.
    pub fn actor_count(&self) -> usize {
        self.sets.len()
    }
}
