//! Configuration entities
//!
//! An entity is one self-contained group of settings: cloneable, comparable
//! field by field, and default-initialized. Every field write that goes
//! through [`assign_field`] records its name in a [`ChangeSet`], which is how
//! the staging pipeline learns exactly what a promotion changed.

use super::change::ChangeSet;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Absolute tolerance for floating point field comparison
pub const FLOAT_EPSILON: f64 = 1e-10;

/// Field-level equality used by entity comparison
pub trait FieldEq {
    fn field_eq(&self, other: &Self) -> bool;
}

impl FieldEq for f64 {
    fn field_eq(&self, other: &Self) -> bool {
        if self.is_nan() || other.is_nan() {
            return self.is_nan() && other.is_nan();
        }
        self == other || (self - other).abs() <= FLOAT_EPSILON
    }
}

impl FieldEq for f32 {
    fn field_eq(&self, other: &Self) -> bool {
        f64::from(*self).field_eq(&f64::from(*other))
    }
}

macro_rules! field_eq_by_partial_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldEq for $ty {
                fn field_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

field_eq_by_partial_eq!(
    bool,
    u8,
    u16,
    u32,
    u64,
    usize,
    i32,
    i64,
    String,
    Decimal,
    NaiveTime,
    NaiveDate,
    DateTime<Utc>,
    Weekday,
    Uuid,
);

impl<T: FieldEq> FieldEq for Option<T> {
    fn field_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.field_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: FieldEq> FieldEq for Vec<T> {
    fn field_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.field_eq(b))
    }
}

/// Copy `src` into `dst` and record `name` when the value actually differs
pub fn assign_field<V>(name: &str, dst: &mut V, src: &V, changes: &mut ChangeSet) -> bool
where
    V: FieldEq + Clone,
{
    if dst.field_eq(src) {
        return false;
    }
    *dst = src.clone();
    changes.insert(name);
    true
}

/// A configuration object held by a [`super::ConfigPair`]
///
/// `Clone` must be a deep copy: child collections are owned, never shared.
pub trait ConfigEntity:
    Clone + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Concrete kind tag, also used as the default storage name
    const KIND: &'static str;

    /// Display label
    fn label(&self) -> String {
        Self::KIND.to_string()
    }

    /// Field-wise equality; floats compare within [`FLOAT_EPSILON`]
    fn config_eq(&self, other: &Self) -> bool;

    /// Overwrite every field from `other`, recording the names that changed
    ///
    /// Keyed child collections must be reconciled with
    /// [`super::differ::reconcile`] so records still referenced elsewhere
    /// keep their identity.
    fn copy_from(&mut self, other: &Self, changes: &mut ChangeSet);

    /// Restore every field to its default value
    fn reset(&mut self, changes: &mut ChangeSet) {
        let defaults = Self::default();
        self.copy_from(&defaults, changes);
    }

    /// Numeric fields subject to the base finiteness check
    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }

    /// Kind-specific checks, run after the base checks
    fn verify_fields(&self, _errors: &mut Vec<String>) {}

    /// Append human-readable problems to `errors`
    ///
    /// Any appended message makes the entity ineligible for promotion.
    fn verify_config(&self, errors: &mut Vec<String>) {
        for (name, value) in self.numeric_fields() {
            if !value.is_finite() {
                errors.push(format!("{}: {} must be a finite number", self.label(), name));
            }
        }
        self.verify_fields(errors);
    }

    /// Names of the fields that differ between `self` and `other`
    fn diff(&self, other: &Self) -> ChangeSet {
        let mut scratch = self.clone();
        let mut changes = ChangeSet::new();
        scratch.copy_from(other, &mut changes);
        changes
    }
}

/// Type-erased view of an entity
pub trait DynEntity: Send + Sync {
    fn kind(&self) -> &'static str;

    fn display_label(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn dyn_eq(&self, other: &dyn DynEntity) -> bool;

    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T: ConfigEntity> DynEntity for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn display_label(&self) -> String {
        self.label()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynEntity) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self.config_eq(other))
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Compare two entities of unknown kind
///
/// A missing right-hand side or a different concrete kind is never equal.
pub fn entity_eq(a: &dyn DynEntity, b: Option<&dyn DynEntity>) -> bool {
    match b {
        Some(b) => a.kind() == b.kind() && a.dyn_eq(b),
        None => false,
    }
}

/// Lazily recomputed derived key
///
/// Setters of key components call [`KeyCache::invalidate`]; the next read
/// recomputes. The cache is never serialized.
pub struct KeyCache<K> {
    cell: OnceLock<K>,
}

impl<K: Clone> KeyCache<K> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> K) -> K {
        self.cell.get_or_init(compute).clone()
    }

    pub fn invalidate(&mut self) {
        self.cell.take();
    }

    pub fn is_cached(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<K: Clone> Default for KeyCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> Clone for KeyCache<K> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for KeyCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("cached", &self.cell.get())
            .finish()
    }
}
