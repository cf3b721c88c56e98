use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::propagation::vector::{self, Vec3};

/// Satisfied when the predicted miss is within this of the target (km).
pub const TARGET_TOLERANCE_KM: f64 = 0.001;

#[derive(Debug, Error)]
pub enum ManeuverError {
    #[error("Object not found: {0}")]
    ObjectNotFound(u32),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Settings for the avoidance search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManeuverParams {
    /// How long before TCA the burn happens, seconds.
    pub burn_lead_sec: f64,
    /// Per-axis bound on the delta-v components.
    pub dv_bound_km_s: f64,
    pub penalty_lambda: f64,
    pub default_target_miss_km: f64,
    pub max_iterations: usize,
}

impl Default for ManeuverParams {
    fn default() -> Self {
        Self {
            burn_lead_sec: 3600.0,
            dv_bound_km_s: 0.002,
            penalty_lambda: 1e5,
            default_target_miss_km: 1.0,
            max_iterations: 1000,
        }
    }
}

/// Avoidance request for a flagged pair. The primary object maneuvers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ToSchema)]
pub struct ManeuverRequest {
    pub sat_id_primary: u32,
    pub sat_id_secondary: u32,
    pub tca: DateTime<Utc>,
    /// Defaults to the configured target when omitted.
    pub target_miss_km: Option<f64>,
}

/// The encounter to avoid and the separation to achieve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnPlan {
    pub burn_time: DateTime<Utc>,
    pub tca: DateTime<Utc>,
    pub target_miss_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ManeuverProposal {
    pub burn_time: DateTime<Utc>,
    pub tca_original: DateTime<Utc>,
    pub predicted_tca: DateTime<Utc>,
    pub predicted_miss_km: f64,
    pub predicted_rel_vel_km_s: f64,
    #[schema(value_type = Vec<f64>)]
    pub dv_vector_km_s: Vec3,
    #[schema(value_type = Vec<f64>)]
    pub dv_vector_m_s: Vec3,
    pub dv_magnitude_km_s: f64,
    pub dv_magnitude_m_s: f64,
    pub success: bool,
    pub message: String,
}

impl ManeuverProposal {
    pub fn new(
        plan: &BurnPlan,
        dv_km_s: Vec3,
        predicted_miss_km: f64,
        predicted_rel_vel_km_s: f64,
        message: impl Into<String>,
    ) -> Self {
        let magnitude = vector::norm(dv_km_s);
        Self {
            burn_time: plan.burn_time,
            tca_original: plan.tca,
            predicted_tca: plan.tca,
            predicted_miss_km,
            predicted_rel_vel_km_s,
            dv_vector_km_s: dv_km_s,
            dv_vector_m_s: vector::scale(dv_km_s, 1000.0),
            dv_magnitude_km_s: magnitude,
            dv_magnitude_m_s: magnitude * 1000.0,
            success: predicted_miss_km >= plan.target_miss_km - TARGET_TOLERANCE_KM,
            message: message.into(),
        }
    }

    /// No burn, reported as a failure regardless of geometry.
    pub fn failed(plan: &BurnPlan, predicted_miss_km: f64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::new(plan, vector::ZERO, predicted_miss_km, 0.0, message)
        }
    }
}
