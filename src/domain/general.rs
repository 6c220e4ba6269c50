use crate::staging::{assign_field, ChangeSet, ConfigEntity, FieldEq};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Robot-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub robot_name: String,
    pub trading_enabled: bool,
    /// Promote verified edits immediately; when false, edits wait for an
    /// explicit apply unless a gate allows them
    pub realtime_update: bool,
    pub max_open_orders: u32,
    /// Rate applied to strategies that do not set their own, in percent
    pub default_rate: f64,
    pub daily_loss_limit: Decimal,
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            robot_name: "robot".to_string(),
            trading_enabled: false,
            realtime_update: true,
            max_open_orders: 10,
            default_rate: 5.0,
            daily_loss_limit: dec!(1000),
            log_level: "info".to_string(),
        }
    }
}

impl ConfigEntity for GeneralSettings {
    const KIND: &'static str = "general";

    fn config_eq(&self, other: &Self) -> bool {
        self.robot_name.field_eq(&other.robot_name)
            && self.trading_enabled.field_eq(&other.trading_enabled)
            && self.realtime_update.field_eq(&other.realtime_update)
            && self.max_open_orders.field_eq(&other.max_open_orders)
            && self.default_rate.field_eq(&other.default_rate)
            && self.daily_loss_limit.field_eq(&other.daily_loss_limit)
            && self.log_level.field_eq(&other.log_level)
    }

    fn copy_from(&mut self, other: &Self, changes: &mut ChangeSet) {
        assign_field("robot_name", &mut self.robot_name, &other.robot_name, changes);
        assign_field(
            "trading_enabled",
            &mut self.trading_enabled,
            &other.trading_enabled,
            changes,
        );
        assign_field(
            "realtime_update",
            &mut self.realtime_update,
            &other.realtime_update,
            changes,
        );
        assign_field(
            "max_open_orders",
            &mut self.max_open_orders,
            &other.max_open_orders,
            changes,
        );
        assign_field(
            "default_rate",
            &mut self.default_rate,
            &other.default_rate,
            changes,
        );
        assign_field(
            "daily_loss_limit",
            &mut self.daily_loss_limit,
            &other.daily_loss_limit,
            changes,
        );
        assign_field("log_level", &mut self.log_level, &other.log_level, changes);
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        vec![("default_rate", self.default_rate)]
    }

    fn verify_fields(&self, errors: &mut Vec<String>) {
        if self.robot_name.trim().is_empty() {
            errors.push("general: robot name is required".to_string());
        }
        if !(1..=1000).contains(&self.max_open_orders) {
            errors.push(format!(
                "general: max open orders {} is outside 1..=1000",
                self.max_open_orders
            ));
        }
        if !(0.0..=100.0).contains(&self.default_rate) {
            errors.push(format!(
                "general: default rate {} is outside 0..=100",
                self.default_rate
            ));
        }
        if self.daily_loss_limit < Decimal::ZERO {
            errors.push(format!(
                "general: daily loss limit {} must not be negative",
                self.daily_loss_limit
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            errors.push(format!("general: unknown log level '{}'", self.log_level));
        }
    }
}
