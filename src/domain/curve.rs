//! Curve parameter records
//!
//! Strategies carry a list of fitted curve values, one per model and tenor.
//! The list is reconciled by key so a row that survives an update keeps its
//! record id.

use crate::staging::{FieldEq, KeyCache, KeyedRecord, MergeFrom};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Curve model a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveModel {
    #[default]
    Linear,
    Cubic,
    NelsonSiegel,
}

impl CurveModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveModel::Linear => "linear",
            CurveModel::Cubic => "cubic",
            CurveModel::NelsonSiegel => "nelson_siegel",
        }
    }
}

impl fmt::Display for CurveModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FieldEq for CurveModel {
    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Key of a curve record: one value per model and tenor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurveKey {
    pub model: CurveModel,
    pub tenor_days: u32,
}

impl fmt::Display for CurveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}d", self.model, self.tenor_days)
    }
}

/// One curve value held by a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoint {
    #[serde(skip, default = "Uuid::new_v4")]
    record_id: Uuid,
    model: CurveModel,
    tenor_days: u32,
    value: f64,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(skip)]
    key: KeyCache<CurveKey>,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for CurvePoint {
    fn default() -> Self {
        Self {
            record_id: Uuid::new_v4(),
            model: CurveModel::default(),
            tenor_days: 0,
            value: 0.0,
            weight: default_weight(),
            key: KeyCache::new(),
        }
    }
}

impl CurvePoint {
    pub fn new(model: CurveModel, tenor_days: u32, value: f64) -> Self {
        Self {
            model,
            tenor_days,
            value,
            ..Default::default()
        }
    }

    /// Identity of this record; never copied by a merge
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn model(&self) -> CurveModel {
        self.model
    }

    pub fn tenor_days(&self) -> u32 {
        self.tenor_days
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_model(&mut self, model: CurveModel) {
        if self.model != model {
            self.model = model;
            self.key.invalidate();
        }
    }

    pub fn set_tenor_days(&mut self, tenor_days: u32) {
        if self.tenor_days != tenor_days {
            self.tenor_days = tenor_days;
            self.key.invalidate();
        }
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl FieldEq for CurvePoint {
    fn field_eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.tenor_days == other.tenor_days
            && self.value.field_eq(&other.value)
            && self.weight.field_eq(&other.weight)
    }
}

impl KeyedRecord for CurvePoint {
    type Key = CurveKey;

    fn key(&self) -> CurveKey {
        self.key.get_or_compute(|| CurveKey {
            model: self.model,
            tenor_days: self.tenor_days,
        })
    }
}

impl MergeFrom<CurvePoint> for CurvePoint {
    fn merge_from(&mut self, source: &CurvePoint) -> bool {
        let changed = !self.field_eq(source);
        self.set_model(source.model);
        self.set_tenor_days(source.tenor_days);
        self.value = source.value;
        self.weight = source.weight;
        changed
    }
}

/// Curve value as delivered by a fitting run, without record identity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSample {
    pub model: CurveModel,
    pub tenor_days: u32,
    pub value: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl CurveSample {
    pub fn new(model: CurveModel, tenor_days: u32, value: f64) -> Self {
        Self {
            model,
            tenor_days,
            value,
            weight: default_weight(),
        }
    }
}

impl KeyedRecord for CurveSample {
    type Key = CurveKey;

    fn key(&self) -> CurveKey {
        CurveKey {
            model: self.model,
            tenor_days: self.tenor_days,
        }
    }
}

impl MergeFrom<CurveSample> for CurvePoint {
    fn merge_from(&mut self, source: &CurveSample) -> bool {
        let changed = self.model != source.model
            || self.tenor_days != source.tenor_days
            || !self.value.field_eq(&source.value)
            || !self.weight.field_eq(&source.weight);
        self.set_model(source.model);
        self.set_tenor_days(source.tenor_days);
        self.value = source.value;
        self.weight = source.weight;
        changed
    }
}

/// Versioned set of curve samples
///
/// A snapshot applies only on top of the curve version it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub version: u64,
    pub parent_version: u64,
    pub samples: Vec<CurveSample>,
}

impl CurveSnapshot {
    pub fn new(parent_version: u64, samples: Vec<CurveSample>) -> Self {
        Self {
            version: parent_version + 1,
            parent_version,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::reconcile;

    #[test]
    fn test_key_recomputed_after_setter() {
        let mut point = CurvePoint::new(CurveModel::Linear, 30, 1.5);
        let key = point.key();
        assert_eq!(key.tenor_days, 30);

        point.set_tenor_days(90);
        assert_eq!(point.key().tenor_days, 90);

        point.set_model(CurveModel::Cubic);
        assert_eq!(point.key().model, CurveModel::Cubic);
    }

    #[test]
    fn test_merge_keeps_record_id() {
        let mut point = CurvePoint::new(CurveModel::Linear, 30, 1.5);
        let id = point.record_id();

        assert!(point.merge_from(&CurveSample::new(CurveModel::Linear, 30, 2.5)));
        assert_eq!(point.record_id(), id);
        assert_eq!(point.value(), 2.5);
        assert!(!point.merge_from(&CurveSample::new(CurveModel::Linear, 30, 2.5)));
    }

    #[test]
    fn test_reconcile_points_from_samples() {
        let mut points = vec![
            CurvePoint::new(CurveModel::Linear, 30, 1.0),
            CurvePoint::new(CurveModel::Linear, 60, 2.0),
            CurvePoint::new(CurveModel::Linear, 90, 3.0),
        ];
        let kept_id = points[1].record_id();
        let samples = vec![
            CurveSample::new(CurveModel::Linear, 60, 2.2),
            CurveSample::new(CurveModel::Linear, 90, 3.0),
            CurveSample::new(CurveModel::Cubic, 30, 4.0),
        ];

        let report = reconcile(&mut points, &samples);

        let keys: Vec<String> = points.iter().map(|p| p.key().to_string()).collect();
        assert_eq!(keys, vec!["linear@60d", "linear@90d", "cubic@30d"]);
        assert_eq!(points[0].record_id(), kept_id);
        assert_eq!(points[0].value(), 2.2);
        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = vec![CurvePoint::new(CurveModel::Linear, 30, 1.0)];
        let mut copy = original.clone();
        copy[0].set_value(9.0);

        assert_eq!(original[0].value(), 1.0);
        assert!(!original.field_eq(&copy));
    }

    #[test]
    fn test_serde_skips_identity_and_cache() {
        let point = CurvePoint::new(CurveModel::NelsonSiegel, 7, 0.25);
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["model"], "nelson_siegel");
        assert!(json.get("record_id").is_none());
        assert!(json.get("key").is_none());

        let back: CurvePoint = serde_json::from_value(json).unwrap();
        assert!(back.field_eq(&point));
        assert_ne!(back.record_id(), point.record_id());
    }
}
