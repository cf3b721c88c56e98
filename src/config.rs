use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::conjunction::ScreeningParams;
use crate::maneuver::ManeuverParams;
use crate::propagation::VelocitySource;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub screening: ScreeningConfig,
    #[serde(default)]
    pub maneuver: ManeuverConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub tle_folder: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            tle_folder: PathBuf::from("data/tle"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub prune_radius_km: f64,
    #[serde(deserialize_with = "human_duration")]
    pub analytic_window: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub search_radius: Duration,
    pub critical_distance_km: f64,
    pub monitoring_threshold_km: f64,
    pub save_threshold_km: f64,
    pub docking_distance_km: f64,
    pub docking_rel_velocity_km_s: f64,
    /// Size of a dedicated screening pool; the global rayon pool when unset.
    pub workers: Option<usize>,
    pub velocity: VelocitySource,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        let params = ScreeningParams::default();
        Self {
            prune_radius_km: params.prune_radius_km,
            analytic_window: Duration::from_secs_f64(params.analytic_window_sec),
            search_radius: Duration::from_secs_f64(params.search_radius_sec),
            critical_distance_km: params.critical_distance_km,
            monitoring_threshold_km: params.monitoring_threshold_km,
            save_threshold_km: params.save_threshold_km,
            docking_distance_km: params.docking_distance_km,
            docking_rel_velocity_km_s: params.docking_rel_velocity_km_s,
            workers: None,
            velocity: VelocitySource::default(),
        }
    }
}

impl ScreeningConfig {
    pub fn params(&self) -> ScreeningParams {
        ScreeningParams {
            prune_radius_km: self.prune_radius_km,
            analytic_window_sec: self.analytic_window.as_secs_f64(),
            search_radius_sec: self.search_radius.as_secs_f64(),
            critical_distance_km: self.critical_distance_km,
            monitoring_threshold_km: self.monitoring_threshold_km,
            save_threshold_km: self.save_threshold_km,
            docking_distance_km: self.docking_distance_km,
            docking_rel_velocity_km_s: self.docking_rel_velocity_km_s,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManeuverConfig {
    #[serde(deserialize_with = "human_duration")]
    pub burn_lead: Duration,
    pub dv_bound_km_s: f64,
    pub penalty_lambda: f64,
    pub default_target_miss_km: f64,
    pub max_iterations: usize,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        let params = ManeuverParams::default();
        Self {
            burn_lead: Duration::from_secs_f64(params.burn_lead_sec),
            dv_bound_km_s: params.dv_bound_km_s,
            penalty_lambda: params.penalty_lambda,
            default_target_miss_km: params.default_target_miss_km,
            max_iterations: params.max_iterations,
        }
    }
}

impl ManeuverConfig {
    pub fn params(&self) -> ManeuverParams {
        ManeuverParams {
            burn_lead_sec: self.burn_lead.as_secs_f64(),
            dv_bound_km_s: self.dv_bound_km_s,
            penalty_lambda: self.penalty_lambda,
            default_target_miss_km: self.default_target_miss_km,
            max_iterations: self.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub folder: PathBuf,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("data/alerts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    RunScreening,
    ReadAlerts,
    PlanManeuver,
    ReadCatalog,
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.screening;
        let positive = [
            ("screening.prune_radius_km", s.prune_radius_km),
            ("screening.critical_distance_km", s.critical_distance_km),
            ("screening.save_threshold_km", s.save_threshold_km),
            ("screening.docking_distance_km", s.docking_distance_km),
            ("screening.docking_rel_velocity_km_s", s.docking_rel_velocity_km_s),
            ("maneuver.penalty_lambda", self.maneuver.penalty_lambda),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if s.monitoring_threshold_km <= s.critical_distance_km {
            return Err(ConfigError::Invalid(format!(
                "screening.monitoring_threshold_km ({}) must exceed critical_distance_km ({})",
                s.monitoring_threshold_km, s.critical_distance_km
            )));
        }
        if s.search_radius.is_zero() {
            return Err(ConfigError::Invalid(
                "screening.search_radius must be non-zero".into(),
            ));
        }
        if s.workers == Some(0) {
            return Err(ConfigError::Invalid("screening.workers must be at least 1".into()));
        }

        let m = &self.maneuver;
        if !(m.dv_bound_km_s.is_finite() && m.dv_bound_km_s >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "maneuver.dv_bound_km_s must be non-negative, got {}",
                m.dv_bound_km_s
            )));
        }
        if !(m.default_target_miss_km.is_finite() && m.default_target_miss_km >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "maneuver.default_target_miss_km must be non-negative, got {}",
                m.default_target_miss_km
            )));
        }
        if m.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "maneuver.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config.screening.params(), ScreeningParams::default());
        assert_eq!(config.maneuver.params(), ManeuverParams::default());
        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
catalog:
  tle_folder: /var/lib/screener/tle
screening:
  prune_radius_km: 250
  analytic_window: 90m
  search_radius: 5m
  workers: 4
  velocity: oracle
maneuver:
  burn_lead: 2h
  dv_bound_km_s: 0.005
alerts:
  folder: /var/lib/screener/alerts
web:
  bind: 127.0.0.1:9000
api_keys:
  - key: secret
    name: ops
    permissions: [run_screening, read_alerts]
"#;
        let config = Config::parse(yaml).unwrap();
        let params = config.screening.params();
        assert_eq!(params.prune_radius_km, 250.0);
        assert_eq!(params.analytic_window_sec, 5400.0);
        assert_eq!(params.search_radius_sec, 300.0);
        assert_eq!(params.monitoring_threshold_km, 75.0);
        assert_eq!(config.screening.workers, Some(4));
        assert_eq!(config.screening.velocity, VelocitySource::Oracle);
        assert_eq!(config.maneuver.params().burn_lead_sec, 7200.0);
        assert_eq!(config.maneuver.params().penalty_lambda, 1e5);

        let key = config.find_api_key("secret").unwrap();
        assert!(key.permissions.contains(&Permission::RunScreening));
        assert!(!key.permissions.contains(&Permission::PlanManeuver));
        assert!(config.find_api_key("other").is_none());
    }

    #[test]
    fn rejects_bad_duration() {
        let err = Config::parse("screening:\n  analytic_window: soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let yaml = "screening:\n  critical_distance_km: 80\n  monitoring_threshold_km: 75\n";
        assert!(matches!(Config::parse(yaml), Err(ConfigError::Invalid(_))));
    }
}
