//! Batched settlement and execution.

use std::sync::Arc;

use alloy_primitives::U256;
use serde::Serialize;
use strand_canonical::ActorId;
use tracing::{info, warn};

use crate::auth::CallContext;
use crate::errors::CoreError;
use crate::events::Notification;
use crate::intent::{IntentId, IntentStore};
use crate::registry::{BranchRegistry, EntryOutcome};
use crate::sink::SharedSink;

/// Summary of one batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Entries submitted, including skipped ones.
    pub count: usize,
    /// Entries that changed state.
    pub settled: usize,
    /// Entries skipped as already settled.
    pub skipped: usize,
    /// Per-entry outcome, in input order. Empty for execution batches.
    #[serde(skip)]
    pub outcomes: Vec<EntryOutcome>,
}

/// Applies many settlements or executions in one call.
pub struct BatchCoordinator {
    registry: Arc<BranchRegistry>,
    intents: Arc<IntentStore>,
    sink: SharedSink,
}

impl BatchCoordinator {
    /// Creates a coordinator over an existing registry and intent store.
    pub fn new(registry: Arc<BranchRegistry>, intents: Arc<IntentStore>, sink: SharedSink) -> Self {
        Self {
            registry,
            intents,
            sink,
        }
    }

    /// Settles every `(actor, token)` pair in order.
    ///
    /// Entries at or below the actor's current last settled token (counting
    /// settlements made earlier in the same batch) are skipped. A token above
    /// it that names no branch fails the whole batch with `InvalidToken`
    /// before any entry is applied. Emits `BatchCompleted` with `count` equal
    /// to the input length.
    pub fn batch_settle(
        &self,
        ctx: &CallContext<'_>,
        pairs: &[(ActorId, u64)],
    ) -> Result<BatchReport, CoreError> {
        if pairs.is_empty() {
            return Err(CoreError::InvalidBatch("empty batch".to_string()));
        }
        for (actor, _) in pairs {
            ctx.ensure_actor_or_authorized(actor)?;
        }

        let outcomes = self.registry.settle_batch(pairs).inspect_err(|e| {
            warn!(count = pairs.len(), error = %e, "batch settle rejected");
        })?;
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, EntryOutcome::Skipped))
            .count();
        let report = BatchReport {
            count: pairs.len(),
            settled: pairs.len() - skipped,
            skipped,
            outcomes,
        };
        self.complete(&report);
        Ok(report)
    }

    /// [`batch_settle`](Self::batch_settle) over parallel actor and token lists.
    pub fn batch_settle_split(
        &self,
        ctx: &CallContext<'_>,
        actors: &[ActorId],
        tokens: &[u64],
    ) -> Result<BatchReport, CoreError> {
        if actors.len() != tokens.len() {
            return Err(CoreError::InvalidBatch(format!(
                "{} actors but {} tokens",
                actors.len(),
                tokens.len()
            )));
        }
        let pairs: Vec<(ActorId, u64)> = actors.iter().cloned().zip(tokens.iter().copied()).collect();
        self.batch_settle(ctx, &pairs)
    }

    /// Executes many intents with one counter update; see
    /// [`IntentStore::batch_execute`].
    pub fn batch_execute(
        &self,
        ctx: &CallContext<'_>,
        ids: &[IntentId],
        values: &[U256],
    ) -> Result<BatchReport, CoreError> {
        self.intents.batch_execute(ctx, ids, values)?;
        let report = BatchReport {
            count: ids.len(),
            settled: ids.len(),
            skipped: 0,
            outcomes: Vec::new(),
        };
        self.complete(&report);
        Ok(report)
    }

    fn complete(&self, report: &BatchReport) {
        info!(
            count = report.count,
            settled = report.settled,
            skipped = report.skipped,
            "batch completed"
        );
        self.sink.emit(Notification::BatchCompleted {
            count: report.count,
            settled: report.settled,
            skipped: report.skipped,
        });
    }
}
