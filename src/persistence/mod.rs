//! Persistence layer for configuration
//!
//! This module keeps promoted configuration on disk:
//! - Stores for named JSON documents
//! - A debounced scheduler that coalesces writes
//! - Bindings from pair and collection events to the scheduler

pub mod binding;
pub mod scheduler;
pub mod store;

pub use binding::{bind_collection, bind_pair, collection_key, pair_key};
pub use scheduler::{
    FlushReport, PersistAction, PersistBatch, PersistenceScheduler, SchedulerConfig,
};
pub use store::{load_or_default, save_entity, ConfigStore, JsonFileStore, MemoryStore};
