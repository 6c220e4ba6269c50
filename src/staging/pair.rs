//! Configuration pair
//!
//! Holds the three buffers of one configuration object:
//! - `ui`: the user-editable draft
//! - `candidate`: scratch space where a promotion is assembled and checked
//! - `effective`: the configuration running code reads
//!
//! Promotion builds the candidate from the effective value plus the draft,
//! runs entity verification and the gate chain, and swaps the candidate into
//! the effective slot only if nothing objected.

use super::change::{ChangeBatch, ChangeSet, EventSource, FieldNotifier, SubscriptionId};
use super::entity::ConfigEntity;
use super::gate::{GateChain, GateId, ValidationGate};
use crate::error::Result;
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Promotion state of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairState {
    /// Draft equals the effective configuration
    InSync,
    /// Draft differs and has not been promoted
    Drifted,
    /// Candidate built, gates running
    PendingGate,
    /// Candidate became the effective configuration
    Promoted,
    /// Verification or a gate reported errors
    Rejected,
}

impl PairState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairState::InSync => "IN_SYNC",
            PairState::Drifted => "DRIFTED",
            PairState::PendingGate => "PENDING_GATE",
            PairState::Promoted => "PROMOTED",
            PairState::Rejected => "REJECTED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: PairState) -> bool {
        use PairState::*;

        match (self, target) {
            // Sync status is recomputed after every mutation
            (_, InSync) | (_, Drifted) => true,

            // A promotion attempt starts from a drifted draft
            (Drifted, PendingGate) | (Rejected, PendingGate) => true,

            // Gate outcome
            (PendingGate, Promoted) | (PendingGate, Rejected) => true,

            _ => false,
        }
    }
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a promotion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Draft already matched the effective configuration
    InSync,
    /// Candidate became effective; carries the changed field names
    Promoted(ChangeSet),
    /// Candidate was valid but not authorized for instant promotion
    Deferred(ChangeSet),
    /// Verification or gates reported errors; nothing was applied
    Rejected(Vec<String>),
}

impl ApplyOutcome {
    pub fn is_promoted(&self) -> bool {
        matches!(self, ApplyOutcome::Promoted(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ApplyOutcome::Rejected(_))
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ApplyOutcome::Rejected(errors) => errors,
            _ => &[],
        }
    }

    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            ApplyOutcome::Promoted(changes) | ApplyOutcome::Deferred(changes) => Some(changes),
            _ => None,
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::InSync => write!(f, "in sync"),
            ApplyOutcome::Promoted(changes) => write!(f, "promoted {}", changes),
            ApplyOutcome::Deferred(changes) => write!(f, "deferred {}", changes),
            ApplyOutcome::Rejected(errors) => write!(f, "rejected: {}", errors.join("; ")),
        }
    }
}

struct Buffers<T> {
    ui: T,
    candidate: T,
    effective: Arc<T>,
    state: PairState,
}

impl<T> Buffers<T> {
    fn set_state(&mut self, name: &str, next: PairState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            debug!("{}: unexpected transition {} -> {}", name, self.state, next);
        }
        self.state = next;
    }
}

/// The draft, candidate and effective versions of one configuration object
pub struct ConfigPair<T: ConfigEntity> {
    name: String,
    buffers: Mutex<Buffers<T>>,
    /// Serializes promotion attempts, including event delivery, so events
    /// arrive in promotion order. Reentrant so an event handler may apply
    /// again on the same thread.
    apply_lock: ReentrantMutex<()>,
    realtime_update: AtomicBool,
    gates: GateChain<T>,
    ui_fields: FieldNotifier,
    effective_changed: EventSource<ChangeSet>,
    ui_diverged: EventSource<ChangeSet>,
    configuration_changed: EventSource<String>,
}

impl<T: ConfigEntity> ConfigPair<T> {
    /// Create a pair whose three buffers all start from `initial`
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into(),
            buffers: Mutex::new(Buffers {
                ui: initial.clone(),
                candidate: initial.clone(),
                effective: Arc::new(initial),
                state: PairState::InSync,
            }),
            apply_lock: ReentrantMutex::new(()),
            realtime_update: AtomicBool::new(true),
            gates: GateChain::new(),
            ui_fields: FieldNotifier::new(),
            effective_changed: EventSource::new(),
            ui_diverged: EventSource::new(),
            configuration_changed: EventSource::new(),
        }
    }

    /// Create a pair from defaults
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, T::default())
    }

    pub fn with_realtime_update(self, enabled: bool) -> Self {
        self.set_realtime_update(enabled);
        self
    }

    pub fn config_name(&self) -> &str {
        &self.name
    }

    /// Whether draft edits are promoted without explicit confirmation
    pub fn realtime_update(&self) -> bool {
        self.realtime_update.load(Ordering::SeqCst)
    }

    pub fn set_realtime_update(&self, enabled: bool) {
        self.realtime_update.store(enabled, Ordering::SeqCst);
    }

    /// Recomputed on every call
    pub fn is_effective_config_up_to_date(&self) -> bool {
        let buffers = self.buffers.lock();
        buffers.ui.config_eq(&buffers.effective)
    }

    pub fn state(&self) -> PairState {
        self.buffers.lock().state
    }

    /// Copy of the draft
    pub fn ui(&self) -> T {
        self.buffers.lock().ui.clone()
    }

    /// Current effective snapshot
    pub fn effective(&self) -> Arc<T> {
        self.buffers.lock().effective.clone()
    }

    /// Fields where the draft differs from the effective configuration
    pub fn pending_changes(&self) -> ChangeSet {
        let buffers = self.buffers.lock();
        buffers.effective.diff(&buffers.ui)
    }

    // ==================== Draft edits ====================

    /// Edit the draft in place
    ///
    /// Changed fields are reported to draft observers, then a promotion is
    /// attempted. Outside realtime mode that attempt needs a gate to grant
    /// instant permission; otherwise the draft stays drifted until
    /// [`Self::try_to_apply_changes`].
    pub fn edit_ui<F>(&self, edit: F) -> ApplyOutcome
    where
        F: FnOnce(&mut T),
    {
        let changes = {
            let mut buffers = self.buffers.lock();
            let before = buffers.ui.clone();
            edit(&mut buffers.ui);
            before.diff(&buffers.ui)
        };

        self.on_ui_fields_changed(changes)
    }

    /// Edit a copy of the draft and keep it only if `edit` succeeds
    ///
    /// On error the draft is untouched and the error is returned.
    pub fn try_edit_ui<F>(&self, edit: F) -> Result<ApplyOutcome>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let changes = {
            let mut buffers = self.buffers.lock();
            let mut draft = buffers.ui.clone();
            edit(&mut draft)?;
            let mut changes = ChangeSet::new();
            buffers.ui.copy_from(&draft, &mut changes);
            changes
        };

        Ok(self.on_ui_fields_changed(changes))
    }

    /// Overwrite the draft from `value`, keeping child record identity
    pub fn replace_ui(&self, value: &T) -> ApplyOutcome {
        self.edit_ui(|ui| {
            let mut ignored = ChangeSet::new();
            ui.copy_from(value, &mut ignored);
        })
    }

    /// Batch draft notifications across several edits
    pub fn batch_ui_notifications(&self) -> ChangeBatch<'_> {
        self.ui_fields.suspend()
    }

    fn on_ui_fields_changed(&self, changes: ChangeSet) -> ApplyOutcome {
        self.ui_fields.notify_all(&changes);

        let in_sync = {
            let mut buffers = self.buffers.lock();
            let in_sync = buffers.ui.config_eq(&buffers.effective);
            let next = if in_sync {
                PairState::InSync
            } else {
                PairState::Drifted
            };
            buffers.set_state(&self.name, next);
            in_sync
        };
        if in_sync {
            return ApplyOutcome::InSync;
        }

        let outcome = self.try_apply(&changes, !self.realtime_update());

        let pending = self.pending_changes();
        if !pending.is_empty() {
            debug!("{}: draft differs from effective in {}", self.name, pending);
            self.ui_diverged.emit(&pending);
        }
        outcome
    }

    /// Discard draft edits by copying the effective configuration back
    ///
    /// Returns false when there was nothing to undo.
    pub fn undo_ui_changes(&self) -> bool {
        let changes = {
            let mut buffers = self.buffers.lock();
            if buffers.ui.config_eq(&buffers.effective) {
                return false;
            }
            let effective = buffers.effective.clone();
            let mut changes = ChangeSet::new();
            buffers.ui.copy_from(&effective, &mut changes);
            buffers.set_state(&self.name, PairState::InSync);
            changes
        };

        debug!("{}: reverted draft fields {}", self.name, changes);
        self.ui_fields.notify_all(&changes);
        true
    }

    // ==================== Promotion ====================

    /// Explicit apply: promote the draft if it verifies
    pub fn try_to_apply_changes(&self) -> ApplyOutcome {
        self.try_apply(&ChangeSet::new(), false)
    }

    /// Attempt to promote the draft
    ///
    /// `extra` names are reported alongside the fields detected as changed.
    /// With `need_permission` set, a valid candidate is promoted only if the
    /// gate chain grants instant permission; otherwise the attempt is
    /// deferred without error.
    pub fn try_apply(&self, extra: &ChangeSet, need_permission: bool) -> ApplyOutcome {
        let _apply = self.apply_lock.lock();

        let (candidate, mut changes) = {
            let mut buffers = self.buffers.lock();
            if buffers.ui.config_eq(&buffers.effective) {
                buffers.set_state(&self.name, PairState::InSync);
                return ApplyOutcome::InSync;
            }
            buffers.set_state(&self.name, PairState::PendingGate);

            let Buffers {
                ui,
                candidate,
                effective,
                ..
            } = &mut *buffers;
            let mut candidate = std::mem::take(candidate);

            let mut scratch = ChangeSet::new();
            candidate.copy_from(&**effective, &mut scratch);

            let mut changes = ChangeSet::new();
            candidate.copy_from(&*ui, &mut changes);
            (candidate, changes)
        };
        changes.union(extra);

        let mut errors = Vec::new();
        candidate.verify_config(&mut errors);
        let decision = self.gates.evaluate(&candidate, &changes, !need_permission);
        errors.extend(decision.errors.iter().cloned());

        if !errors.is_empty() {
            let mut buffers = self.buffers.lock();
            buffers.candidate = candidate;
            buffers.set_state(&self.name, PairState::Rejected);
            warn!(
                "Rejected changes to {} {}: {}",
                self.name,
                changes,
                errors.join("; ")
            );
            return ApplyOutcome::Rejected(errors);
        }

        if need_permission && !decision.allow_instant() {
            let mut buffers = self.buffers.lock();
            buffers.candidate = candidate;
            buffers.set_state(&self.name, PairState::Drifted);
            debug!(
                "Deferred changes to {} {}: instant update not granted",
                self.name, changes
            );
            return ApplyOutcome::Deferred(changes);
        }

        {
            let mut buffers = self.buffers.lock();
            let previous = std::mem::replace(&mut buffers.effective, Arc::new(candidate));
            // Readers still holding the old snapshot force a copy
            buffers.candidate = Arc::try_unwrap(previous).unwrap_or_else(|shared| (*shared).clone());
            buffers.set_state(&self.name, PairState::Promoted);

            let next = if buffers.ui.config_eq(&buffers.effective) {
                PairState::InSync
            } else {
                PairState::Drifted
            };
            buffers.set_state(&self.name, next);
        }

        info!("Promoted {} config: {}", self.name, changes);
        self.effective_changed.emit(&changes);
        self.configuration_changed.emit(&self.name);
        ApplyOutcome::Promoted(changes)
    }

    // ==================== Gates ====================

    pub fn register_gate(&self, gate: Arc<dyn ValidationGate<T>>) -> GateId {
        self.gates.register(gate)
    }

    pub fn unregister_gate(&self, id: GateId) -> bool {
        self.gates.unregister(id)
    }

    /// Withdraw every gate registration
    pub fn clear_gates(&self) {
        self.gates.clear();
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    // ==================== Events ====================

    /// Fired after a promotion with the changed field names
    pub fn on_effective_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.effective_changed.subscribe(callback)
    }

    /// Fired when an edit leaves the draft different from effective
    pub fn on_ui_diverged<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.ui_diverged.subscribe(callback)
    }

    /// Fired after every promotion; the persistence trigger
    pub fn on_configuration_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.configuration_changed
            .subscribe(move |name: &String| callback(name.as_str()))
    }

    /// Fired with the names of draft fields changed by edits or undo
    pub fn on_ui_field_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.ui_fields.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.effective_changed.unsubscribe(id)
            || self.ui_diverged.unsubscribe(id)
            || self.configuration_changed.unsubscribe(id)
            || self.ui_fields.unsubscribe(id)
    }
}

impl<T: ConfigEntity> fmt::Debug for ConfigPair<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigPair")
            .field("name", &self.name)
            .field("kind", &T::KIND)
            .field("state", &self.state())
            .field("realtime_update", &self.realtime_update())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::entity::{assign_field, FieldEq};
    use crate::staging::gate::{gate_fn, GateContext, GateVote};
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct RateConfig {
        rate: f64,
        note: String,
    }

    impl ConfigEntity for RateConfig {
        const KIND: &'static str = "rate";

        fn config_eq(&self, other: &Self) -> bool {
            self.rate.field_eq(&other.rate) && self.note.field_eq(&other.note)
        }

        fn copy_from(&mut self, other: &Self, changes: &mut ChangeSet) {
            assign_field("rate", &mut self.rate, &other.rate, changes);
            assign_field("note", &mut self.note, &other.note, changes);
        }

        fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
            vec![("rate", self.rate)]
        }
    }

    fn pair_with_rate(rate: f64) -> ConfigPair<RateConfig> {
        ConfigPair::new(
            "rates",
            RateConfig {
                rate,
                note: String::new(),
            },
        )
    }

    fn counting_gate(calls: Arc<AtomicUsize>, vote: GateVote) -> Arc<dyn ValidationGate<RateConfig>> {
        gate_fn(move |_: &RateConfig, _: &GateContext, _: &mut Vec<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            vote
        })
    }

    fn record_effective(pair: &ConfigPair<RateConfig>) -> Arc<Mutex<Vec<ChangeSet>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pair.on_effective_changed(move |changes| sink.lock().push(changes.clone()));
        seen
    }

    #[test]
    fn test_in_sync_apply_is_noop() {
        let pair = pair_with_rate(5.0);
        let calls = Arc::new(AtomicUsize::new(0));
        pair.register_gate(counting_gate(calls.clone(), GateVote::Allow));
        let events = record_effective(&pair);

        assert_eq!(pair.try_to_apply_changes(), ApplyOutcome::InSync);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(events.lock().is_empty());
        assert_eq!(pair.state(), PairState::InSync);
    }

    #[test]
    fn test_realtime_edit_promotes_with_single_event() {
        let pair = pair_with_rate(5.0);
        let events = record_effective(&pair);

        let outcome = pair.edit_ui(|ui| ui.rate = 7.0);

        assert!(outcome.is_promoted());
        assert_eq!(pair.effective().rate, 7.0);
        assert!(pair.is_effective_config_up_to_date());
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].names(), vec!["rate".to_string()]);
    }

    #[test]
    fn test_gate_error_blocks_promotion() {
        let pair = pair_with_rate(5.0);
        pair.register_gate(gate_fn(
            |c: &RateConfig, _: &GateContext, errors: &mut Vec<String>| {
                if c.rate > 6.0 {
                    errors.push("rate out of range".to_string());
                }
                GateVote::Abstain
            },
        ));
        let events = record_effective(&pair);

        let outcome = pair.edit_ui(|ui| ui.rate = 7.0);

        assert_eq!(outcome.errors().to_vec(), vec!["rate out of range".to_string()]);
        assert_eq!(pair.effective().rate, 5.0);
        assert_eq!(pair.ui().rate, 7.0);
        assert!(!pair.is_effective_config_up_to_date());
        assert_eq!(pair.state(), PairState::Rejected);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_entity_verification_rejects_non_finite() {
        let pair = pair_with_rate(5.0);
        let outcome = pair.edit_ui(|ui| ui.rate = f64::NAN);

        assert!(outcome.is_rejected());
        assert_eq!(pair.effective().rate, 5.0);
    }

    #[test]
    fn test_manual_mode_defers_until_explicit_apply() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        let diverged = Arc::new(AtomicUsize::new(0));
        let sink = diverged.clone();
        pair.on_ui_diverged(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = pair.edit_ui(|ui| ui.rate = 7.0);
        assert!(matches!(outcome, ApplyOutcome::Deferred(_)));
        assert_eq!(pair.effective().rate, 5.0);
        assert_eq!(pair.state(), PairState::Drifted);
        assert_eq!(diverged.load(Ordering::SeqCst), 1);

        assert!(pair.try_to_apply_changes().is_promoted());
        assert_eq!(pair.effective().rate, 7.0);
        assert_eq!(pair.state(), PairState::InSync);
    }

    #[test]
    fn test_manual_mode_gate_grant_promotes_instantly() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        pair.register_gate(gate_fn(
            |_: &RateConfig, ctx: &GateContext, _: &mut Vec<String>| {
                if ctx.changes.contains("note") {
                    GateVote::Allow
                } else {
                    GateVote::Abstain
                }
            },
        ));

        assert!(pair.edit_ui(|ui| ui.note = "cosmetic".into()).is_promoted());
        assert!(matches!(
            pair.edit_ui(|ui| ui.rate = 9.0),
            ApplyOutcome::Deferred(_)
        ));
    }

    #[test]
    fn test_allow_and_deny_gates_defer() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        let calls = Arc::new(AtomicUsize::new(0));
        pair.register_gate(counting_gate(calls.clone(), GateVote::Allow));
        pair.register_gate(counting_gate(calls.clone(), GateVote::Deny));

        let outcome = pair.edit_ui(|ui| ui.rate = 7.0);

        assert!(matches!(outcome, ApplyOutcome::Deferred(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pair.effective().rate, 5.0);
    }

    #[test]
    fn test_failed_try_edit_leaves_draft_untouched() {
        let pair = pair_with_rate(5.0);

        let result = pair.try_edit_ui(|ui| {
            ui.rate = 8.0;
            Err(crate::error::StagingError::InvalidPatch {
                target: "rates".into(),
                reason: "boom".into(),
            })
        });

        assert!(result.is_err());
        assert_eq!(pair.ui().rate, 5.0);
        assert_eq!(pair.state(), PairState::InSync);
    }

    #[test]
    fn test_undo_restores_draft() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        assert!(!pair.undo_ui_changes());

        pair.edit_ui(|ui| ui.rate = 7.0);
        assert!(pair.undo_ui_changes());
        assert_eq!(pair.ui().rate, 5.0);
        assert!(pair.is_effective_config_up_to_date());
        assert_eq!(pair.state(), PairState::InSync);
    }

    #[test]
    fn test_extra_names_are_reported() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        pair.edit_ui(|ui| ui.rate = 6.0);

        let extra: ChangeSet = ["recalculate"].into_iter().collect();
        let outcome = pair.try_apply(&extra, false);

        let changes = outcome.changes().cloned().unwrap_or_default();
        assert!(changes.contains("rate"));
        assert!(changes.contains("recalculate"));
    }

    #[test]
    fn test_old_snapshot_survives_promotion() {
        let pair = pair_with_rate(5.0);
        let before = pair.effective();

        pair.edit_ui(|ui| ui.rate = 7.0);

        assert_eq!(before.rate, 5.0);
        assert_eq!(pair.effective().rate, 7.0);
    }

    #[test]
    fn test_configuration_changed_follows_promotion_order() {
        let pair = pair_with_rate(1.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pair.on_configuration_changed(move |name| sink.lock().push(name.to_string()));

        for rate in [2.0, 3.0, 4.0] {
            pair.edit_ui(|ui| ui.rate = rate);
        }

        assert_eq!(seen.lock().len(), 3);
        assert_eq!(pair.effective().rate, 4.0);
    }

    #[test]
    fn test_batched_ui_notifications() {
        let pair = pair_with_rate(5.0).with_realtime_update(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pair.on_ui_field_changed(move |changes| sink.lock().push(changes.clone()));

        {
            let _batch = pair.batch_ui_notifications();
            pair.edit_ui(|ui| ui.rate = 6.0);
            pair.edit_ui(|ui| ui.note = "x".into());
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 2);
    }

    #[test]
    fn test_unsubscribe_any_event() {
        let pair = pair_with_rate(5.0);
        let id = pair.on_configuration_changed(|_| {});
        assert!(pair.unsubscribe(id));
        assert!(!pair.unsubscribe(id));
    }

    #[test]
    fn test_concurrent_applies_serialize() {
        let pair = Arc::new(pair_with_rate(0.0).with_realtime_update(false));
        let events = record_effective(&pair);

        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let pair = pair.clone();
                std::thread::spawn(move || {
                    pair.edit_ui(|ui| ui.rate = i as f64);
                    pair.try_to_apply_changes()
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.join();
        }

        assert!(pair.is_effective_config_up_to_date());
        assert!(!events.lock().is_empty());
    }

    #[test]
    fn test_state_transitions() {
        assert!(PairState::Drifted.can_transition_to(PairState::PendingGate));
        assert!(PairState::PendingGate.can_transition_to(PairState::Rejected));
        assert!(PairState::Rejected.can_transition_to(PairState::PendingGate));
        assert!(!PairState::InSync.can_transition_to(PairState::Promoted));
        assert!(!PairState::Promoted.can_transition_to(PairState::Rejected));
    }
}
