//! Trading periods
//!
//! A period is a named daily window on a set of weekdays. Strategies refer to
//! periods by name.

use crate::staging::{assign_field, ChangeSet, ConfigEntity, FieldEq};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingPeriod {
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weekdays: Vec<Weekday>,
    pub active: bool,
}

impl Default for TradingPeriod {
    fn default() -> Self {
        Self {
            name: String::new(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            active: true,
        }
    }
}

impl TradingPeriod {
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            ..Default::default()
        }
    }

    /// Whether `time` on `weekday` falls inside this period (end exclusive)
    pub fn contains(&self, weekday: Weekday, time: NaiveTime) -> bool {
        self.active && self.weekdays.contains(&weekday) && self.start <= time && time < self.end
    }
}

impl ConfigEntity for TradingPeriod {
    const KIND: &'static str = "period";

    fn label(&self) -> String {
        self.name.clone()
    }

    fn config_eq(&self, other: &Self) -> bool {
        self.name.field_eq(&other.name)
            && self.start.field_eq(&other.start)
            && self.end.field_eq(&other.end)
            && self.weekdays.field_eq(&other.weekdays)
            && self.active.field_eq(&other.active)
    }

    fn copy_from(&mut self, other: &Self, changes: &mut ChangeSet) {
        assign_field("name", &mut self.name, &other.name, changes);
        assign_field("start", &mut self.start, &other.start, changes);
        assign_field("end", &mut self.end, &other.end, changes);
        assign_field("weekdays", &mut self.weekdays, &other.weekdays, changes);
        assign_field("active", &mut self.active, &other.active, changes);
    }

    fn verify_fields(&self, errors: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            errors.push("period: name is required".to_string());
        }
        if self.start >= self.end {
            errors.push(format!(
                "{}: start {} must be before end {}",
                self.name, self.start, self.end
            ));
        }
        if self.weekdays.is_empty() {
            errors.push(format!("{}: at least one weekday is required", self.name));
        }
        let mut seen = HashSet::new();
        for day in &self.weekdays {
            if !seen.insert(*day) {
                errors.push(format!("{}: weekday {} listed twice", self.name, day));
            }
        }
    }
}
