//! Wiring between staging events and the persistence scheduler

use super::scheduler::{PersistAction, PersistenceScheduler};
use super::store::{save_entity, ConfigStore};
use crate::error::Result;
use crate::staging::{ConfigCollection, ConfigEntity, ConfigPair, SubscriptionId};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Writes the latest effective value of a pair
struct PairWrite<T: ConfigEntity> {
    pair: Weak<ConfigPair<T>>,
    store: Arc<dyn ConfigStore>,
}

impl<T: ConfigEntity> PersistAction for PairWrite<T> {
    fn persist(&self) -> Result<()> {
        let Some(pair) = self.pair.upgrade() else {
            debug!("Skipping write for a dropped {} pair", T::KIND);
            return Ok(());
        };
        let effective = pair.effective();
        save_entity(self.store.as_ref(), pair.config_name(), &*effective)
    }
}

/// Writes the effective values of every collection member as one document
struct CollectionWrite<T: ConfigEntity> {
    collection: Weak<ConfigCollection<T>>,
    store: Arc<dyn ConfigStore>,
}

impl<T: ConfigEntity> PersistAction for CollectionWrite<T> {
    fn persist(&self) -> Result<()> {
        let Some(collection) = self.collection.upgrade() else {
            debug!("Skipping write for a dropped {} collection", T::KIND);
            return Ok(());
        };
        let snapshots = collection.effective_snapshots();
        save_entity(self.store.as_ref(), collection.name(), &snapshots)
    }
}

/// Scheduler key for a pair stored under its own name
pub fn pair_key(name: &str) -> String {
    format!("pair:{}", name)
}

pub fn collection_key(name: &str) -> String {
    format!("collection:{}", name)
}

/// Schedule a write of `pair` after every promotion
pub fn bind_pair<T: ConfigEntity>(
    pair: &Arc<ConfigPair<T>>,
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<PersistenceScheduler>,
) -> SubscriptionId {
    let key = pair_key(pair.config_name());
    let action: Arc<dyn PersistAction> = Arc::new(PairWrite {
        pair: Arc::downgrade(pair),
        store,
    });
    pair.on_configuration_changed(move |_| scheduler.schedule(key.clone(), action.clone()))
}

/// Schedule a write of the whole collection on membership changes and
/// member promotions
pub fn bind_collection<T: ConfigEntity>(
    collection: &Arc<ConfigCollection<T>>,
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<PersistenceScheduler>,
) -> SubscriptionId {
    let key = collection_key(collection.name());
    let action: Arc<dyn PersistAction> = Arc::new(CollectionWrite {
        collection: Arc::downgrade(collection),
        store,
    });
    collection.on_changed(move |_| scheduler.schedule(key.clone(), action.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeneralSettings, StrategySettings};
    use crate::persistence::store::{load_or_default, MemoryStore};
    use crate::persistence::SchedulerConfig;
    use std::time::{Duration, Instant};

    fn immediate() -> Arc<PersistenceScheduler> {
        Arc::new(PersistenceScheduler::new(SchedulerConfig {
            min_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
        }))
    }

    #[test]
    fn test_burst_of_promotions_writes_final_state_once() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = immediate();
        let pair = Arc::new(ConfigPair::<GeneralSettings>::with_defaults("general"));
        bind_pair(&pair, store.clone(), scheduler.clone());

        let t0 = Instant::now();
        scheduler.poll(t0);
        for orders in 11..=20 {
            assert!(pair.edit_ui(|ui| ui.max_open_orders = orders).is_promoted());
        }
        let report = PersistenceScheduler::run_batch(scheduler.poll(t0));

        assert_eq!(report.written, 1);
        assert_eq!(store.write_count(), 1);
        let saved: GeneralSettings = load_or_default(store.as_ref(), "general").unwrap();
        assert_eq!(saved.max_open_orders, 20);
    }

    #[test]
    fn test_rejected_edit_schedules_nothing() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = immediate();
        let pair = Arc::new(ConfigPair::<GeneralSettings>::with_defaults("general"));
        bind_pair(&pair, store, scheduler.clone());

        assert!(pair.edit_ui(|ui| ui.max_open_orders = 0).is_rejected());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_dropped_pair_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = immediate();
        let pair = Arc::new(ConfigPair::<GeneralSettings>::with_defaults("general"));
        bind_pair(&pair, store.clone(), scheduler.clone());

        pair.edit_ui(|ui| ui.trading_enabled = true);
        drop(pair);

        let report = scheduler.flush_all();
        assert_eq!(report.written, 1);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_collection_membership_and_promotions_persist() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = immediate();
        let collection = Arc::new(ConfigCollection::<StrategySettings>::new("strategies"));
        bind_collection(&collection, store.clone(), scheduler.clone());

        let eur = collection
            .add_entity(StrategySettings::new("EURUSD"))
            .unwrap();
        collection
            .add_entity(StrategySettings::new("GBPUSD"))
            .unwrap();
        eur.edit_ui(|ui| ui.rate = 9.0);
        assert_eq!(scheduler.pending(), 1);

        scheduler.flush_all();
        let saved: Vec<StrategySettings> =
            load_or_default(store.as_ref(), "strategies").unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].rate, 9.0);
        assert_eq!(saved[1].instrument_id, "GBPUSD");
    }
}
