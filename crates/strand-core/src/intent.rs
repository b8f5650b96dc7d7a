//! Intent lifecycle: submit, then execute or cancel exactly once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::U256;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strand_canonical::{
    compute_content_id, payload_ref, ActorId, Canonicalizer, ContentDomain, Digest, PrincipalId,
    Timestamp,
};
use tracing::debug;

use crate::auth::CallContext;
use crate::branch::BranchState;
use crate::clock::Clock;
use crate::config::ExecutionPolicy;
use crate::counter::{AggregateCounter, CounterDelta};
use crate::errors::CoreError;
use crate::events::Notification;
use crate::registry::BranchRegistry;
use crate::shard::ShardedMap;
use crate::sink::SharedSink;

/// Counter receiving the sum of settlement values.
pub const VOLUME_COUNTER: &str = "intent.volume";
/// Counter receiving the number of executed intents.
pub const EXECUTED_COUNTER: &str = "intent.executed";

/// Content-addressed intent identifier: `H(actor, token, payload)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(Digest);

impl IntentId {
    /// Wraps a digest computed elsewhere.
    pub fn from_digest(digest: Digest) -> Self {
        Self(digest)
    }

    /// The underlying digest.
    pub fn digest(&self) -> &Digest {
        &self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.b64)
    }
}

/// Computes the id of the intent `(actor, token, payload)`.
///
/// The preimage is the canonical JSON object
/// `{"actor", "token" (decimal string), "payload" (base64url)}`, so anyone
/// holding the three values can recompute and check an id.
pub fn compute_intent_id(
    actor: &ActorId,
    token: u64,
    payload: &[u8],
    canonicalizer: &Canonicalizer,
) -> Result<IntentId, CoreError> {
    let preimage = json!({
        "actor": actor,
        "token": token.to_string(),
        "payload": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload),
    });
    let digest = compute_content_id(ContentDomain::Intent, &preimage, canonicalizer)?;
    Ok(IntentId(digest))
}

/// Where an intent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Submitted, neither executed nor cancelled.
    Pending,
    /// Executed by an authorized executor.
    Executed,
    /// Cancelled by its actor or an authorized executor.
    Cancelled,
}

/// An opaque operation request bound to one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Content-addressed id.
    pub id: IntentId,
    /// Owning actor.
    pub actor: ActorId,
    /// Branch token.
    pub token: u64,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Submission time.
    pub created_at: Timestamp,
    /// Set once by `execute_intent` / `batch_execute`.
    pub executed: bool,
    /// Set once by `cancel_intent`.
    pub cancelled: bool,
    /// Time of execution or cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<Timestamp>,
}

impl Intent {
    /// Lifecycle status.
    pub fn status(&self) -> IntentStatus {
        match (self.executed, self.cancelled) {
            (true, _) => IntentStatus::Executed,
            (_, true) => IntentStatus::Cancelled,
            _ => IntentStatus::Pending,
        }
    }

    fn ensure_unprocessed(&self) -> Result<(), CoreError> {
        if self.executed || self.cancelled {
            return Err(CoreError::AlreadyProcessed {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Snapshot of the store's aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntentMetrics {
    /// Sum of settlement values of executed intents.
    pub volume: U256,
    /// Number of executed intents.
    pub executed_count: U256,
}

/// Intents keyed by content id, built on a [`BranchRegistry`].
pub struct IntentStore {
    intents: ShardedMap<IntentId, Intent>,
    registry: Arc<BranchRegistry>,
    volume: AggregateCounter,
    executed: AggregateCounter,
    policy: ExecutionPolicy,
    canonicalizer: Canonicalizer,
    sink: SharedSink,
    clock: Arc<dyn Clock>,
}

impl IntentStore {
    /// Creates an empty store. `counter_owner` may reset the aggregate counters.
    pub fn new(
        shard_count: usize,
        registry: Arc<BranchRegistry>,
        policy: ExecutionPolicy,
        counter_owner: PrincipalId,
        sink: SharedSink,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            intents: ShardedMap::new(shard_count),
            registry,
            volume: AggregateCounter::new(VOLUME_COUNTER, counter_owner.clone(), sink.clone()),
            executed: AggregateCounter::new(EXECUTED_COUNTER, counter_owner, sink.clone()),
            policy,
            canonicalizer: Canonicalizer::default(),
            sink,
            clock,
        }
    }

    /// Stores a new intent and registers its branch.
    ///
    /// Fails `IntentAlreadyExists` for a repeated `(actor, token, payload)`,
    /// and propagates branch registration errors without storing anything.
    pub fn submit_intent(
        &self,
        ctx: &CallContext<'_>,
        actor: &ActorId,
        token: u64,
        payload: Vec<u8>,
    ) -> Result<IntentId, CoreError> {
        ctx.ensure_actor_or_authorized(actor)?;
        let id = compute_intent_id(actor, token, &payload, &self.canonicalizer)?;

        let mut shard = self.intents.lock(&id);
        if shard.contains_key(&id) {
            return Err(CoreError::IntentAlreadyExists { id });
        }
        self.registry
            .register_exclusive(ctx, actor, token, payload_ref(&payload))?;

        debug!(intent_id = %id, actor = %actor, token, "intent submitted");
        shard.insert(
            id.clone(),
            Intent {
                id: id.clone(),
                actor: actor.clone(),
                token,
                payload,
                created_at: self.clock.now(),
                executed: false,
                cancelled: false,
                processed_at: None,
            },
        );
        self.sink.emit(Notification::IntentSubmitted {
            id: id.clone(),
            actor: actor.clone(),
            token,
        });
        Ok(id)
    }

    /// Executes an intent once, adding `settlement_value` to the volume counter.
    pub fn execute_intent(
        &self,
        ctx: &CallContext<'_>,
        id: &IntentId,
        settlement_value: U256,
    ) -> Result<(), CoreError> {
        ctx.ensure_authorized()?;
        let mut shard = self.intents.lock(id);
        let intent = shard
            .get_mut(id)
            .ok_or_else(|| CoreError::IntentNotFound { id: id.clone() })?;
        intent.ensure_unprocessed()?;
        self.ensure_executable(intent)?;

        AggregateCounter::apply_together(&[
            (&self.volume, CounterDelta::Increase(settlement_value)),
            (&self.executed, CounterDelta::Increase(U256::from(1u64))),
        ])?;

        intent.executed = true;
        intent.processed_at = Some(self.clock.now());
        debug!(intent_id = %id, value = %settlement_value, "intent executed");
        self.sink.emit(Notification::IntentExecuted {
            id: id.clone(),
            actor: intent.actor.clone(),
            token: intent.token,
            value: settlement_value,
        });
        Ok(())
    }

    /// Cancels an intent once. Counters and the branch are left untouched.
    pub fn cancel_intent(&self, ctx: &CallContext<'_>, id: &IntentId) -> Result<(), CoreError> {
        let mut shard = self.intents.lock(id);
        let intent = shard
            .get_mut(id)
            .ok_or_else(|| CoreError::IntentNotFound { id: id.clone() })?;
        ctx.ensure_actor_or_authorized(&intent.actor)?;
        intent.ensure_unprocessed()?;

        intent.cancelled = true;
        intent.processed_at = Some(self.clock.now());
        debug!(intent_id = %id, "intent cancelled");
        self.sink.emit(Notification::IntentCancelled {
            id: id.clone(),
            actor: intent.actor.clone(),
            token: intent.token,
        });
        Ok(())
    }

    /// Executes many intents with one combined counter update.
    ///
    /// Every item is checked before anything changes; a duplicate id inside
    /// the batch fails `AlreadyProcessed` like a second call would.
    pub fn batch_execute(
        &self,
        ctx: &CallContext<'_>,
        ids: &[IntentId],
        values: &[U256],
    ) -> Result<(), CoreError> {
        ctx.ensure_authorized()?;
        if ids.is_empty() {
            return Err(CoreError::InvalidBatch("empty batch".to_string()));
        }
        if ids.len() != values.len() {
            return Err(CoreError::InvalidBatch(format!(
                "{} ids but {} values",
                ids.len(),
                values.len()
            )));
        }

        let mut shards = self.intents.lock_many(ids);
        let mut seen = HashSet::with_capacity(ids.len());
        let mut total = U256::ZERO;
        for (id, value) in ids.iter().zip(values) {
            let intent = shards
                .get(id)
                .ok_or_else(|| CoreError::IntentNotFound { id: id.clone() })?;
            intent.ensure_unprocessed()?;
            if !seen.insert(id) {
                return Err(CoreError::AlreadyProcessed { id: id.clone() });
            }
            self.ensure_executable(intent)?;
            total = total.checked_add(*value).ok_or_else(|| CoreError::Arithmetic {
                counter: VOLUME_COUNTER.to_string(),
                reason: "overflow",
            })?;
        }

        AggregateCounter::apply_together(&[
            (&self.volume, CounterDelta::Increase(total)),
            (&self.executed, CounterDelta::Increase(U256::from(ids.len()))),
        ])?;

        let now = self.clock.now();
        for (id, value) in ids.iter().zip(values) {
            if let Some(intent) = shards.get_mut(id) {
                intent.executed = true;
                intent.processed_at = Some(now.clone());
                self.sink.emit(Notification::IntentExecuted {
                    id: id.clone(),
                    actor: intent.actor.clone(),
                    token: intent.token,
                    value: *value,
                });
            }
        }
        debug!(count = ids.len(), total = %total, "intent batch executed");
        Ok(())
    }

    fn ensure_executable(&self, intent: &Intent) -> Result<(), CoreError> {
        if self.policy == ExecutionPolicy::TrustExecutor {
            return Ok(());
        }
        match self.registry.branch_state(&intent.actor, intent.token) {
            Some(BranchState::Settled) => Ok(()),
            state => Err(CoreError::BranchNotSettled {
                actor: intent.actor.clone(),
                token: intent.token,
                state,
            }),
        }
    }

    /// Copy of an intent.
    pub fn get_intent(&self, id: &IntentId) -> Option<Intent> {
        self.intents.lock(id).get(id).cloned()
    }

    /// Lifecycle status of an intent.
    pub fn intent_status(&self, id: &IntentId) -> Option<IntentStatus> {
        self.intents.lock(id).get(id).map(Intent::status)
    }

    /// Number of stored intents.
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Id the store would assign to `(actor, token, payload)`.
    pub fn compute_intent_id(
        &self,
        actor: &ActorId,
        token: u64,
        payload: &[u8],
    ) -> Result<IntentId, CoreError> {
        compute_intent_id(actor, token, payload, &self.canonicalizer)
    }

    /// Whether `intent.id` matches its `(actor, token, payload)`.
    pub fn verify_intent_id(&self, intent: &Intent) -> Result<bool, CoreError> {
        Ok(self.compute_intent_id(&intent.actor, intent.token, &intent.payload)? == intent.id)
    }

    /// Current counter values.
    pub fn metrics(&self) -> IntentMetrics {
        IntentMetrics {
            volume: self.volume.current(),
            executed_count: self.executed.current(),
        }
    }

    /// Volume counter. Direct writes need an authorized caller and resets
    /// need the counter owner.
    pub fn volume_counter(&self) -> &AggregateCounter {
        &self.volume
    }

    /// Executed-count counter.
    pub fn executed_counter(&self) -> &AggregateCounter {
        &self.executed
    }

    /// Active execution policy.
    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }
}
