//! Root configuration aggregate
//!
//! Owns every staged configuration of one robot and keeps them persisted.
//! Documents are stored as `general`, `strategies` and `periods`.

use crate::config::AppConfig;
use crate::domain::{GeneralSettings, StrategySettings, TradingPeriod};
use crate::error::{Result, StagingError};
use crate::persistence::{
    bind_collection, bind_pair, load_or_default, ConfigStore, FlushReport, JsonFileStore,
    PersistenceScheduler,
};
use crate::staging::{
    gate_fn, ApplyOutcome, ChangeSet, ConfigCollection, ConfigEntity, ConfigPair, DynEntity,
    GateContext, GateVote, ValidationGate,
};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const GENERAL_DOC: &str = "general";
pub const STRATEGIES_DOC: &str = "strategies";
pub const PERIODS_DOC: &str = "periods";

/// Addressable configuration inside a robot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigTarget {
    General,
    Strategy(String),
    Period(String),
}

impl ConfigTarget {
    /// Parse `general`, `strategy:<id>` or `period:<name>`
    pub fn parse(target: &str) -> Result<Self> {
        match target.split_once(':') {
            None if target == GENERAL_DOC => Ok(ConfigTarget::General),
            Some(("strategy", id)) if !id.is_empty() => Ok(ConfigTarget::Strategy(id.to_string())),
            Some(("period", name)) if !name.is_empty() => {
                Ok(ConfigTarget::Period(name.to_string()))
            }
            _ => Err(StagingError::UnknownTarget(target.to_string())),
        }
    }
}

impl std::fmt::Display for ConfigTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTarget::General => write!(f, "{}", GENERAL_DOC),
            ConfigTarget::Strategy(id) => write!(f, "strategy:{}", id),
            ConfigTarget::Period(name) => write!(f, "period:{}", name),
        }
    }
}

/// Every staged configuration of one robot
pub struct RobotConfig {
    general: Arc<ConfigPair<GeneralSettings>>,
    strategies: Arc<ConfigCollection<StrategySettings>>,
    periods: Arc<ConfigCollection<TradingPeriod>>,
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<PersistenceScheduler>,
}

impl RobotConfig {
    /// Open the robot configuration described by `app`
    pub fn open(app: &AppConfig) -> Result<Self> {
        let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::new(&app.storage.dir));
        let scheduler = Arc::new(PersistenceScheduler::new(
            app.persistence.scheduler_config(),
        ));
        Self::with_store(store, scheduler, app.staging.realtime_update)
    }

    /// Load every document from `store`, using defaults for missing ones
    pub fn with_store(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<PersistenceScheduler>,
        realtime_override: Option<bool>,
    ) -> Result<Self> {
        let mut general: GeneralSettings = load_or_default(store.as_ref(), GENERAL_DOC)?;
        if let Some(enabled) = realtime_override {
            general.realtime_update = enabled;
        }
        let realtime = general.realtime_update;

        let strategies: Vec<StrategySettings> = load_or_default(store.as_ref(), STRATEGIES_DOC)?;
        let periods: Vec<TradingPeriod> = load_or_default(store.as_ref(), PERIODS_DOC)?;

        let general = Arc::new(ConfigPair::new(GENERAL_DOC, general).with_realtime_update(realtime));
        let strategies = Arc::new(ConfigCollection::from_entities(
            STRATEGIES_DOC,
            strategies,
            realtime,
        )?);
        let periods = Arc::new(ConfigCollection::from_entities(
            PERIODS_DOC,
            periods,
            realtime,
        )?);

        let robot = Self {
            general,
            strategies,
            periods,
            store,
            scheduler,
        };
        robot.wire();

        info!(
            "Opened robot config: {} strategies, {} periods, realtime update {}",
            robot.strategies.len(),
            robot.periods.len(),
            realtime
        );
        Ok(robot)
    }

    fn wire(&self) {
        bind_pair(&self.general, self.store.clone(), self.scheduler.clone());
        bind_collection(&self.strategies, self.store.clone(), self.scheduler.clone());
        bind_collection(&self.periods, self.store.clone(), self.scheduler.clone());

        for pair in self.strategies.list() {
            pair.register_gate(period_reference_gate(Arc::downgrade(&self.periods)));
        }

        let general = Arc::downgrade(&self.general);
        let strategies = Arc::downgrade(&self.strategies);
        let periods = Arc::downgrade(&self.periods);
        self.general.on_effective_changed(move |changes| {
            if !changes.contains("realtime_update") {
                return;
            }
            let Some(general) = general.upgrade() else {
                return;
            };
            let enabled = general.effective().realtime_update;
            general.set_realtime_update(enabled);
            if let Some(strategies) = strategies.upgrade() {
                strategies.set_realtime_update(enabled);
            }
            if let Some(periods) = periods.upgrade() {
                periods.set_realtime_update(enabled);
            }
            info!("Realtime update {}", if enabled { "enabled" } else { "disabled" });
        });
    }

    pub fn general(&self) -> &Arc<ConfigPair<GeneralSettings>> {
        &self.general
    }

    pub fn strategies(&self) -> &Arc<ConfigCollection<StrategySettings>> {
        &self.strategies
    }

    pub fn periods(&self) -> &Arc<ConfigCollection<TradingPeriod>> {
        &self.periods
    }

    pub fn scheduler(&self) -> &Arc<PersistenceScheduler> {
        &self.scheduler
    }

    pub fn strategy(&self, instrument_id: &str) -> Option<Arc<ConfigPair<StrategySettings>>> {
        self.strategies.get(instrument_id)
    }

    pub fn period(&self, name: &str) -> Option<Arc<ConfigPair<TradingPeriod>>> {
        self.periods.get(name)
    }

    /// Add a strategy; it is persisted with the next flush
    pub fn add_strategy(&self, settings: StrategySettings) -> Result<Arc<ConfigPair<StrategySettings>>> {
        warn_if_invalid(&settings);
        let pair = self.strategies.add_entity(settings)?;
        pair.register_gate(period_reference_gate(Arc::downgrade(&self.periods)));
        Ok(pair)
    }

    pub fn remove_strategy(&self, instrument_id: &str) -> Option<Arc<ConfigPair<StrategySettings>>> {
        self.strategies.remove(instrument_id)
    }

    pub fn add_period(&self, period: TradingPeriod) -> Result<Arc<ConfigPair<TradingPeriod>>> {
        warn_if_invalid(&period);
        self.periods.add_entity(period)
    }

    pub fn remove_period(&self, name: &str) -> Option<Arc<ConfigPair<TradingPeriod>>> {
        self.periods.remove(name)
    }

    /// Verification messages of every effective configuration
    ///
    /// Every target is listed, with an empty list when it verifies.
    pub fn verify_all(&self) -> Vec<(String, Vec<String>)> {
        let mut report = Vec::new();

        let mut errors = Vec::new();
        self.general.effective().verify_config(&mut errors);
        report.push((ConfigTarget::General.to_string(), errors));

        for pair in self.strategies.list() {
            let strategy = pair.effective();
            let mut errors = Vec::new();
            strategy.verify_config(&mut errors);
            errors.extend(missing_period(&strategy, &self.periods));
            report.push((
                ConfigTarget::Strategy(pair.config_name().to_string()).to_string(),
                errors,
            ));
        }

        for pair in self.periods.list() {
            let mut errors = Vec::new();
            pair.effective().verify_config(&mut errors);
            report.push((
                ConfigTarget::Period(pair.config_name().to_string()).to_string(),
                errors,
            ));
        }

        report
    }

    /// Merge a JSON object into the draft of `target` and apply it
    ///
    /// Top-level keys replace whole fields. Unknown targets, unknown fields
    /// and badly shaped values are errors; a patch that fails verification
    /// comes back as [`ApplyOutcome::Rejected`].
    pub fn apply_json_patch(&self, target: &str, patch: &Value) -> Result<ApplyOutcome> {
        let parsed = ConfigTarget::parse(target)?;
        match &parsed {
            ConfigTarget::General => patch_pair(&self.general, target, patch),
            ConfigTarget::Strategy(id) => {
                let pair = self
                    .strategy(id)
                    .ok_or_else(|| StagingError::UnknownTarget(target.to_string()))?;
                patch_pair(&pair, target, patch)
            }
            ConfigTarget::Period(name) => {
                let pair = self
                    .period(name)
                    .ok_or_else(|| StagingError::UnknownTarget(target.to_string()))?;
                patch_pair(&pair, target, patch)
            }
        }
    }

    /// Effective configuration of every target, in display order
    pub fn effective_entities(&self) -> Vec<(String, Arc<dyn DynEntity>)> {
        let mut entities: Vec<(String, Arc<dyn DynEntity>)> = Vec::new();
        entities.push((ConfigTarget::General.to_string(), self.general.effective()));
        for pair in self.strategies.list() {
            entities.push((
                ConfigTarget::Strategy(pair.config_name().to_string()).to_string(),
                pair.effective(),
            ));
        }
        for pair in self.periods.list() {
            entities.push((
                ConfigTarget::Period(pair.config_name().to_string()).to_string(),
                pair.effective(),
            ));
        }
        entities
    }

    /// Start the background persistence loop
    pub fn start_persistence(&self) -> JoinHandle<()> {
        self.scheduler.clone().start()
    }

    /// Stop background persistence and write everything still pending
    pub fn shutdown(&self) -> FlushReport {
        self.scheduler.stop();
        self.scheduler.flush_all()
    }

    /// Stop the loop from [`start_persistence`](Self::start_persistence),
    /// wait for its last tick, then flush
    pub async fn shutdown_persistence(&self, handle: JoinHandle<()>) -> FlushReport {
        self.scheduler.stop();
        if let Err(e) = handle.await {
            error!("Persistence task failed: {}", e);
        }
        self.scheduler.flush_all()
    }
}

impl std::fmt::Debug for RobotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotConfig")
            .field("general", &self.general)
            .field("strategies", &self.strategies)
            .field("periods", &self.periods)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

fn warn_if_invalid<T: ConfigEntity>(entity: &T) {
    let mut errors = Vec::new();
    entity.verify_config(&mut errors);
    if !errors.is_empty() {
        warn!("Added {} {} with problems: {}", T::KIND, entity.label(), errors.join("; "));
    }
}

fn missing_period(
    strategy: &StrategySettings,
    periods: &ConfigCollection<TradingPeriod>,
) -> Option<String> {
    let name = strategy.period.as_deref()?;
    if periods.get(name).is_some() {
        return None;
    }
    Some(format!("{}: unknown period '{}'", strategy.instrument_id, name))
}

/// Refuse strategies that refer to a period the robot does not define
fn period_reference_gate(
    periods: Weak<ConfigCollection<TradingPeriod>>,
) -> Arc<dyn ValidationGate<StrategySettings>> {
    gate_fn(
        move |candidate: &StrategySettings, _: &GateContext, errors: &mut Vec<String>| {
            let Some(periods) = periods.upgrade() else {
                return GateVote::Abstain;
            };
            match missing_period(candidate, &periods) {
                Some(error) => {
                    errors.push(error);
                    GateVote::Deny
                }
                None => GateVote::Abstain,
            }
        },
    )
}

fn patch_pair<T: ConfigEntity>(
    pair: &ConfigPair<T>,
    target: &str,
    patch: &Value,
) -> Result<ApplyOutcome> {
    let fields = patch.as_object().ok_or_else(|| StagingError::InvalidPatch {
        target: target.to_string(),
        reason: "patch must be a JSON object".to_string(),
    })?;

    let outcome = pair.try_edit_ui(|ui| {
        let invalid = |reason: String| StagingError::InvalidPatch {
            target: target.to_string(),
            reason,
        };

        let mut value = serde_json::to_value(&*ui)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| invalid("configuration is not a JSON object".to_string()))?;
        for (key, field) in fields {
            match object.get_mut(key) {
                Some(slot) => *slot = field.clone(),
                None => return Err(invalid(format!("unknown field '{}'", key))),
            }
        }

        let patched: T = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

        let mut ignored = ChangeSet::new();
        ui.copy_from(&patched, &mut ignored);
        Ok(())
    })?;

    Ok(match outcome {
        ApplyOutcome::Deferred(_) => pair.try_to_apply_changes(),
        other => other,
    })
}
