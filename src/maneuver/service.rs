use log::info;

use crate::catalog::{Catalog, OrbitalObject};
use crate::maneuver::optimizer::find_minimal_dv;
use crate::maneuver::types::{
    BurnPlan, ManeuverError, ManeuverParams, ManeuverProposal, ManeuverRequest,
};
use crate::propagation::{seconds, Propagator, TrajectoryPropagator};

/// Plan an avoidance burn for `request.sat_id_primary`, `burn_lead_sec`
/// before the encounter with `request.sat_id_secondary`.
pub fn calculate_maneuver<P, T>(
    catalog: &Catalog,
    propagator: &P,
    post_burn: &T,
    request: &ManeuverRequest,
    params: &ManeuverParams,
) -> Result<ManeuverProposal, ManeuverError>
where
    P: Propagator<Object = OrbitalObject>,
    T: TrajectoryPropagator,
{
    if request.sat_id_primary == request.sat_id_secondary {
        return Err(ManeuverError::InvalidRequest(
            "primary and secondary must be different objects".into(),
        ));
    }
    let target_miss_km = request
        .target_miss_km
        .unwrap_or(params.default_target_miss_km);
    if !target_miss_km.is_finite() || target_miss_km < 0.0 {
        return Err(ManeuverError::InvalidRequest(format!(
            "target_miss_km must be a non-negative number, got {}",
            target_miss_km
        )));
    }

    let own = catalog
        .get(request.sat_id_primary)
        .ok_or(ManeuverError::ObjectNotFound(request.sat_id_primary))?;
    let threat = catalog
        .get(request.sat_id_secondary)
        .ok_or(ManeuverError::ObjectNotFound(request.sat_id_secondary))?;

    let burn_time = request
        .tca
        .checked_sub_signed(seconds(params.burn_lead_sec))
        .ok_or_else(|| ManeuverError::InvalidRequest("burn time out of range".into()))?;
    let plan = BurnPlan {
        burn_time,
        tca: request.tca,
        target_miss_km,
    };

    info!(
        "Planning maneuver for {} against {} (TCA {}, target {} km)",
        own.id, threat.id, plan.tca, target_miss_km
    );
    let proposal = find_minimal_dv(propagator, post_burn, threat, own, &plan, params);
    info!(
        "Maneuver for {}: success={} dv={:.4} m/s miss={:.3} km ({})",
        own.id,
        proposal.success,
        proposal.dv_magnitude_m_s,
        proposal.predicted_miss_km,
        proposal.message
    );
    Ok(proposal)
}
