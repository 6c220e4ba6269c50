//! Per-instrument strategy settings

use super::curve::{CurveKey, CurveModel, CurvePoint, CurveSnapshot};
use crate::error::{Result, StagingError};
use crate::staging::{
    assign_field, reconcile, ChangeSet, ConfigEntity, FieldEq, KeyedRecord, ReconcileReport,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum accepted rate, in percent
pub const MAX_RATE: f64 = 100.0;

/// Strategy configuration for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Instrument the strategy trades; also the pair name
    pub instrument_id: String,
    pub enabled: bool,
    /// Quoting rate in percent
    pub rate: f64,
    pub model: CurveModel,
    /// Maximum position size in instrument units
    pub max_position: Decimal,
    /// Name of the trading period this strategy is restricted to
    pub period: Option<String>,
    pub curve_points: Vec<CurvePoint>,
    /// Version of the curve the points were taken from
    pub curve_version: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            instrument_id: String::new(),
            enabled: false,
            rate: 5.0,
            model: CurveModel::Linear,
            max_position: dec!(100),
            period: None,
            curve_points: Vec::new(),
            curve_version: 0,
        }
    }
}

impl StrategySettings {
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            ..Default::default()
        }
    }

    /// Replace the curve points from a snapshot derived from the current version
    ///
    /// Surviving points keep their record ids. A snapshot built on another
    /// version is a caller bug and is refused.
    pub fn apply_curve_snapshot(
        &mut self,
        snapshot: &CurveSnapshot,
        changes: &mut ChangeSet,
    ) -> Result<ReconcileReport> {
        if snapshot.parent_version != self.curve_version {
            return Err(StagingError::VersionMismatch {
                parent: snapshot.parent_version,
                current: self.curve_version,
            });
        }

        let report = reconcile(&mut self.curve_points, &snapshot.samples);
        if report.is_changed() {
            changes.insert("curve_points");
        }
        assign_field(
            "curve_version",
            &mut self.curve_version,
            &snapshot.version,
            changes,
        );
        Ok(report)
    }

    pub fn curve_point(&self, model: CurveModel, tenor_days: u32) -> Option<&CurvePoint> {
        let key = CurveKey { model, tenor_days };
        self.curve_points.iter().find(|p| p.key() == key)
    }
}

/// Compare curve lists as keyed sets; the last record per key counts
fn curve_points_eq(a: &[CurvePoint], b: &[CurvePoint]) -> bool {
    let index = |points: &[CurvePoint]| -> HashMap<CurveKey, usize> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key(), i))
            .collect()
    };
    let left = index(a);
    let right = index(b);

    left.len() == right.len()
        && left.iter().all(|(key, &i)| {
            right
                .get(key)
                .is_some_and(|&j| a[i].field_eq(&b[j]))
        })
}

impl ConfigEntity for StrategySettings {
    const KIND: &'static str = "strategy";

    fn label(&self) -> String {
        self.instrument_id.clone()
    }

    fn config_eq(&self, other: &Self) -> bool {
        self.instrument_id.field_eq(&other.instrument_id)
            && self.enabled.field_eq(&other.enabled)
            && self.rate.field_eq(&other.rate)
            && self.model == other.model
            && self.max_position.field_eq(&other.max_position)
            && self.period.field_eq(&other.period)
            && self.curve_version.field_eq(&other.curve_version)
            && curve_points_eq(&self.curve_points, &other.curve_points)
    }

    fn copy_from(&mut self, other: &Self, changes: &mut ChangeSet) {
        assign_field(
            "instrument_id",
            &mut self.instrument_id,
            &other.instrument_id,
            changes,
        );
        assign_field("enabled", &mut self.enabled, &other.enabled, changes);
        assign_field("rate", &mut self.rate, &other.rate, changes);
        assign_field("model", &mut self.model, &other.model, changes);
        assign_field(
            "max_position",
            &mut self.max_position,
            &other.max_position,
            changes,
        );
        assign_field("period", &mut self.period, &other.period, changes);
        assign_field(
            "curve_version",
            &mut self.curve_version,
            &other.curve_version,
            changes,
        );

        if reconcile(&mut self.curve_points, &other.curve_points).is_changed() {
            changes.insert("curve_points");
        }
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        let mut fields = vec![("rate", self.rate)];
        for point in &self.curve_points {
            fields.push(("curve_points.value", point.value()));
            fields.push(("curve_points.weight", point.weight()));
        }
        fields
    }

    fn verify_fields(&self, errors: &mut Vec<String>) {
        if self.instrument_id.trim().is_empty() {
            errors.push("strategy: instrument id is required".to_string());
        }
        let label = self.label();

        if !(0.0..=MAX_RATE).contains(&self.rate) {
            errors.push(format!(
                "{}: rate {} is outside 0..={}",
                label, self.rate, MAX_RATE
            ));
        }
        if self.max_position < Decimal::ZERO {
            errors.push(format!(
                "{}: max position {} must not be negative",
                label, self.max_position
            ));
        }
        if let Some(period) = &self.period {
            if period.trim().is_empty() {
                errors.push(format!("{}: period name must not be blank", label));
            }
        }

        // Points sharing a key collapse to the last one when merged
        for point in &self.curve_points {
            let key = point.key();
            if point.tenor_days() == 0 {
                errors.push(format!("{}: curve point {} has zero tenor", label, key));
            }
            if !(0.0..=1.0).contains(&point.weight()) {
                errors.push(format!(
                    "{}: curve point {} weight {} is outside 0..=1",
                    label,
                    key,
                    point.weight()
                ));
            }
        }
    }
}
