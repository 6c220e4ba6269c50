//! Configuration staging engine
//!
//! Every configuration object lives in three buffers (draft, candidate,
//! effective). Edits land in the draft, get verified and gated as a
//! candidate, and replace the effective configuration atomically:
//! - [`change`]: change-name sets, batching and event fan-out
//! - [`entity`]: the entity contract and field comparison helpers
//! - [`gate`]: pluggable validation and instant-update votes
//! - [`pair`]: the three-buffer state machine
//! - [`collection`]: ordered lists of pairs
//! - [`differ`]: keyed reconciliation of child collections

pub mod change;
pub mod collection;
pub mod differ;
pub mod entity;
pub mod gate;
pub mod pair;

pub use change::{ChangeBatch, ChangeSet, EventSource, FieldNotifier, SubscriptionId};
pub use collection::{CollectionChange, ConfigCollection};
pub use differ::{reconcile, KeyedRecord, MergeFrom, ReconcileReport};
pub use entity::{
    assign_field, entity_eq, ConfigEntity, DynEntity, FieldEq, KeyCache, FLOAT_EPSILON,
};
pub use gate::{
    compose_vote, gate_fn, GateChain, GateContext, GateDecision, GateId, GateVote, ValidationGate,
};
pub use pair::{ApplyOutcome, ConfigPair, PairState};
