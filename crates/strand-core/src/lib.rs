//! Settlement kernel for Strand.
//!
//! This crate provides:
//! - A per-actor branch registry where settling one token collapses the set
//! - Content-addressed intents that execute or cancel exactly once
//! - Isolated aggregate counters with checked 256-bit arithmetic
//! - Batched settlement and execution
//! - An explicit allow-list passed into every guarded call
//!
//! Core invariants:
//! - An actor's last settled token never decreases, and a branch that
//!   leaves `Pending` never changes state again
//! - A failed operation changes nothing and emits nothing
//! - Notifications for one actor are emitted in transition order
//!
#![deny(missing_docs)]

/// Allow-list and per-call caller context.
pub mod auth;
/// Batched settlement and execution.
pub mod batch;
/// Branch records and states.
pub mod branch;
/// Timestamp sources.
pub mod clock;
/// Engine configuration.
pub mod config;
/// Aggregate counters.
pub mod counter;
/// Component wiring.
pub mod engine;
/// Error types for core operations.
pub mod errors;
/// Notification types.
pub mod events;
/// Intent store.
pub mod intent;
/// Branch registry.
pub mod registry;
/// Sharded maps.
pub mod shard;
/// Notification sinks.
pub mod sink;

pub use alloy_primitives::U256;
pub use auth::{AuthorizationContext, CallContext};
pub use batch::{BatchCoordinator, BatchReport};
pub use branch::{Branch, BranchState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, ExecutionPolicy};
pub use counter::{AggregateCounter, CounterDelta};
pub use engine::SettlementEngine;
pub use errors::CoreError;
pub use events::{CounterDirection, Notification};
pub use intent::{
    compute_intent_id, Intent, IntentId, IntentMetrics, IntentStatus, IntentStore,
    EXECUTED_COUNTER, VOLUME_COUNTER,
};
pub use registry::{BranchRegistry, EntryOutcome};
pub use shard::{ShardSet, ShardedMap, DEFAULT_SHARD_COUNT};
pub use sink::{EventSink, FanoutSink, MemorySink, NoopSink, SharedSink, TracingSink};
