#![allow(dead_code)]
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::constraints::Mask;
use crate::domain::load::{LoadKind, OperatingMode};
use crate::domain::site::DistributionMode;

/// Site-wide configuration (spec.md §6's "configuration enumeration").
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SiteConfig {
    #[serde(default = "default_voltage")]
    #[validate(range(min = 1.0))]
    pub voltage: f64,

    #[serde(default = "default_main_breaker_rating_a")]
    #[validate(range(min = 0.0))]
    pub main_breaker_rating_a: f64,

    /// Optional W cap on grid import, tighter than the breaker alone.
    #[serde(default)]
    pub max_grid_import_power_w: Option<f64>,

    #[serde(default = "default_excess_export_threshold_w")]
    pub excess_export_threshold_w: f64,

    #[validate(nested)]
    pub battery: Option<BatteryConfig>,

    #[validate(nested)]
    pub inverter: InverterConfig,

    #[serde(default)]
    pub distribution_mode: DistributionMode,

    #[serde(default = "default_sensor_timeout_secs")]
    pub sensor_timeout_secs: u64,

    #[validate(nested)]
    pub loads: Vec<LoadConfig>,

    #[serde(default)]
    pub circuit_groups: Vec<CircuitGroupConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BatteryConfig {
    #[serde(default = "default_battery_soc_min")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub soc_min: f64,

    #[serde(default = "default_battery_soc_target")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub soc_target: f64,

    #[serde(default = "default_battery_soc_hysteresis")]
    pub soc_hysteresis: f64,

    #[serde(default = "default_battery_max_charge_power_w")]
    pub max_charge_power_w: f64,

    #[serde(default = "default_battery_max_discharge_power_w")]
    pub max_discharge_power_w: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct InverterConfig {
    #[serde(default)]
    pub max_power_w: f64,

    #[serde(default)]
    pub max_power_per_phase_w: f64,

    #[serde(default)]
    pub supports_asymmetric: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoadConfig {
    #[validate(length(min = 1))]
    pub id: String,

    pub kind: LoadKind,

    #[serde(default = "default_min_current_a")]
    pub min_current_a: f64,

    #[serde(default = "default_max_current_a")]
    pub max_current_a: f64,

    #[serde(default = "default_phases")]
    pub phases: u8,

    pub active_phases_mask: Mask,

    #[serde(default = "default_priority")]
    #[validate(range(min = 1, max = 10))]
    pub priority: u16,

    pub operating_mode: OperatingMode,

    #[serde(default = "default_update_frequency_secs")]
    pub update_frequency_secs: u64,

    #[serde(default = "default_charge_pause_duration_secs")]
    pub charge_pause_duration_secs: u64,

    /// Plug-only; rated power in watts.
    #[serde(default)]
    pub rated_power_w: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CircuitGroupConfig {
    #[validate(length(min = 1))]
    pub id: String,
    pub current_limit_per_phase_a: f64,
    pub member_ids: Vec<String>,
}

fn default_voltage() -> f64 {
    230.0
}
fn default_main_breaker_rating_a() -> f64 {
    25.0
}
fn default_excess_export_threshold_w() -> f64 {
    13000.0
}
fn default_sensor_timeout_secs() -> u64 {
    60
}
fn default_battery_soc_min() -> f64 {
    20.0
}
fn default_battery_soc_target() -> f64 {
    80.0
}
fn default_battery_soc_hysteresis() -> f64 {
    3.0
}
fn default_battery_max_charge_power_w() -> f64 {
    5000.0
}
fn default_battery_max_discharge_power_w() -> f64 {
    5000.0
}
fn default_min_current_a() -> f64 {
    6.0
}
fn default_max_current_a() -> f64 {
    16.0
}
fn default_phases() -> u8 {
    3
}
fn default_priority() -> u16 {
    5
}
fn default_update_frequency_secs() -> u64 {
    15
}
fn default_charge_pause_duration_secs() -> u64 {
    180
}

impl SiteConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/<environment>.toml` (or `config/development.toml` if none given)
    /// 3. Environment variables prefixed `LOADJUGGLER__`, `__`-delimited.
    pub fn load() -> Result<Self> {
        Self::load_with_env(None)
    }

    pub fn load_with_env(environment: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config/default.toml"));

        if let Some(env) = environment {
            figment = figment.merge(Toml::file(format!("config/{env}.toml")));
        } else {
            figment = figment.merge(Toml::file("config/development.toml").nested());
        }

        figment = figment.merge(Env::prefixed("LOADJUGGLER__").split("__"));

        let config: SiteConfig = figment.extract().context("failed to parse configuration")?;
        config.validate().context("configuration validation failed")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_config_parses_from_toml() {
        let toml = r#"
            voltage = 230.0
            main_breaker_rating_a = 25.0
            excess_export_threshold_w = 13000.0

            [inverter]
            max_power_w = 6900.0
            supports_asymmetric = false

            [[loads]]
            id = "c1"
            kind = "Evse"
            active_phases_mask = "Abc"
            operating_mode = "Standard"
        "#;

        let config: SiteConfig = Figment::new().merge(Toml::string(toml)).extract().unwrap();
        assert_eq!(config.loads.len(), 1);
        assert_eq!(config.loads[0].min_current_a, 6.0, "falls back to the default minimum");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn priority_out_of_range_fails_validation() {
        let toml = r#"
            [inverter]

            [[loads]]
            id = "c1"
            kind = "Evse"
            active_phases_mask = "Abc"
            operating_mode = "Standard"
            priority = 99
        "#;

        let config: SiteConfig = Figment::new().merge(Toml::string(toml)).extract().unwrap();
        assert!(config.validate().is_err());
    }
}
