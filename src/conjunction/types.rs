use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EventType {
    #[default]
    Collision,
    /// Close, slow approach: formation flight or berthing rather than a hazard.
    Docking,
}

/// Unordered object pair, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidatePair {
    first: u32,
    second: u32,
}

impl CandidatePair {
    /// `None` for a self pair.
    pub fn new(a: u32, b: u32) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self {
                first: a,
                second: b,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                first: b,
                second: a,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn second(&self) -> u32 {
        self.second
    }
}

impl std::fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConjunctionEvent {
    pub sat1_id: u32,
    pub sat2_id: u32,
    pub tca: DateTime<Utc>,
    pub miss_distance_km: f64,
    pub rel_velocity_km_s: f64,
    pub score: f64,
    pub event_type: EventType,
}

/// Result of analysing one candidate pair.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    Event(ConjunctionEvent),
    Skipped { pair: CandidatePair, reason: String },
}

/// Thresholds and windows for one screening run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningParams {
    pub prune_radius_km: f64,
    pub analytic_window_sec: f64,
    pub search_radius_sec: f64,
    pub critical_distance_km: f64,
    pub monitoring_threshold_km: f64,
    pub save_threshold_km: f64,
    pub docking_distance_km: f64,
    pub docking_rel_velocity_km_s: f64,
}

impl Default for ScreeningParams {
    fn default() -> Self {
        Self {
            prune_radius_km: 300.0,
            analytic_window_sec: 7200.0,
            search_radius_sec: 600.0,
            critical_distance_km: 10.0,
            monitoring_threshold_km: 75.0,
            save_threshold_km: 150.0,
            docking_distance_km: 1.0,
            docking_rel_velocity_km_s: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn pair_is_normalised() {
        let a = CandidatePair::new(49044, 25544).unwrap();
        let b = CandidatePair::new(25544, 49044).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.first(), 25544);
        assert!(CandidatePair::new(7, 7).is_none());
    }

    #[test]
    fn event_type_text_forms() {
        assert_eq!(EventType::Docking.to_string(), "DOCKING");
        assert_eq!(EventType::from_str("collision").unwrap(), EventType::Collision);
        assert_eq!(EventType::from_str("Docking").unwrap(), EventType::Docking);
        assert!(EventType::from_str("near_miss").is_err());
        assert_eq!(
            serde_json::to_string(&EventType::Collision).unwrap(),
            "\"COLLISION\""
        );
    }
}
