use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::maneuver::simplex::{minimize_in_box, SimplexOptions};
use crate::maneuver::types::{BurnPlan, ManeuverParams, ManeuverProposal};
use crate::propagation::vector::{self, Vec3};
use crate::propagation::{
    finite_difference_state, seconds, PropagationError, Propagator, StateVector,
    TrajectoryPropagator,
};

/// Step for the post-burn relative velocity difference, seconds.
const REL_VELOCITY_STEP_SEC: f64 = 1.0;
const SIMPLEX_RESTARTS: usize = 3;
const RAY_BISECTIONS: usize = 60;

/// Geometry that does not depend on the burn: the maneuvering object's state
/// at burn time and the threat's positions around TCA.
struct Encounter<'a, T> {
    post_burn: &'a T,
    own_at_burn: StateVector,
    threat_at_tca: Vec3,
    threat_after_tca: Vec3,
    tca: DateTime<Utc>,
}

impl<T: TrajectoryPropagator> Encounter<'_, T> {
    fn own_at(&self, dv: Vec3, at: DateTime<Utc>) -> Result<Vec3, PropagationError> {
        self.post_burn.propagate_from(
            self.own_at_burn.position_km,
            vector::add(self.own_at_burn.velocity_km_s, dv),
            self.own_at_burn.epoch,
            at,
        )
    }

    fn miss(&self, dv: Vec3) -> Result<f64, PropagationError> {
        Ok(vector::distance(self.threat_at_tca, self.own_at(dv, self.tca)?))
    }

    fn miss_and_rel_velocity(&self, dv: Vec3) -> Result<(f64, f64), PropagationError> {
        let own = self.own_at(dv, self.tca)?;
        let own_after = self.own_at(dv, self.tca + seconds(REL_VELOCITY_STEP_SEC))?;

        let threat_motion = vector::sub(self.threat_after_tca, self.threat_at_tca);
        let own_motion = vector::sub(own_after, own);
        let rel_velocity =
            vector::norm(vector::sub(threat_motion, own_motion)) / REL_VELOCITY_STEP_SEC;

        Ok((vector::distance(self.threat_at_tca, own), rel_velocity))
    }
}

/// Smallest impulsive delta-v for `own` at `plan.burn_time` that opens the
/// separation from `threat` at `plan.tca` to `plan.target_miss_km`.
///
/// The threat keeps its catalog trajectory; the maneuvering object is
/// propagated from its post-burn state with `post_burn`. Never fails: any
/// problem is reported as an unsuccessful proposal with zero delta-v.
pub fn find_minimal_dv<P, T>(
    propagator: &P,
    post_burn: &T,
    threat: &P::Object,
    own: &P::Object,
    plan: &BurnPlan,
    params: &ManeuverParams,
) -> ManeuverProposal
where
    P: Propagator,
    T: TrajectoryPropagator,
{
    let encounter = match encounter(propagator, post_burn, threat, own, plan) {
        Ok(e) => e,
        Err(e) => {
            warn!("Cannot set up maneuver search: {}", e);
            return ManeuverProposal::failed(plan, 0.0, format!("Propagation error: {}", e));
        }
    };

    let (nominal_miss, nominal_rel_velocity) = match encounter.miss_and_rel_velocity(vector::ZERO) {
        Ok(v) => v,
        Err(e) => {
            return ManeuverProposal::failed(plan, 0.0, format!("Propagation error: {}", e));
        }
    };

    if nominal_miss >= plan.target_miss_km {
        return ManeuverProposal::new(
            plan,
            vector::ZERO,
            nominal_miss,
            nominal_rel_velocity,
            "Current trajectory already meets the target miss distance",
        );
    }
    let bound = params.dv_bound_km_s;
    if bound <= 0.0 {
        return ManeuverProposal::new(
            plan,
            vector::ZERO,
            nominal_miss,
            nominal_rel_velocity,
            "No delta-v budget available",
        );
    }

    let objective = |dv: Vec3| {
        // a failed post-burn propagation counts as no separation at all
        let miss = encounter.miss(dv).unwrap_or(0.0);
        let shortfall = (plan.target_miss_km - miss).max(0.0);
        vector::norm(dv) + params.penalty_lambda * shortfall * shortfall
    };

    let options = SimplexOptions {
        initial_step: 0.5 * bound,
        xatol: bound * 1e-6,
        fatol: 1e-8,
        max_iterations: params.max_iterations,
        restarts: SIMPLEX_RESTARTS,
    };
    let result = minimize_in_box(&objective, vector::ZERO, bound, &options);
    debug!(
        "Simplex finished after {} iterations (converged: {}, objective {:.6e})",
        result.iterations, result.converged, result.value
    );

    if !result.converged {
        return ManeuverProposal::failed(
            plan,
            nominal_miss,
            format!(
                "Optimizer did not converge within {} iterations",
                result.iterations
            ),
        );
    }
    if !vector::is_finite(result.x) || !result.value.is_finite() {
        return ManeuverProposal::failed(plan, nominal_miss, "Optimizer produced a non-finite delta-v");
    }

    let mut dv = result.x;
    if let Some(shorter) = shortest_along_ray(&encounter, dv, bound, plan.target_miss_km) {
        if objective(shorter) < objective(dv) {
            dv = shorter;
        }
    }

    match encounter.miss_and_rel_velocity(dv) {
        Ok((miss, rel_velocity)) => {
            ManeuverProposal::new(plan, dv, miss, rel_velocity, "Optimization finished")
        }
        Err(e) => ManeuverProposal::failed(
            plan,
            nominal_miss,
            format!("Propagation error after optimization: {}", e),
        ),
    }
}

fn encounter<'a, P, T>(
    propagator: &P,
    post_burn: &'a T,
    threat: &P::Object,
    own: &P::Object,
    plan: &BurnPlan,
) -> Result<Encounter<'a, T>, PropagationError>
where
    P: Propagator,
    T: TrajectoryPropagator,
{
    Ok(Encounter {
        post_burn,
        own_at_burn: finite_difference_state(propagator, own, plan.burn_time)?,
        threat_at_tca: propagator.position(threat, plan.tca)?,
        threat_after_tca: propagator
            .position(threat, plan.tca + seconds(REL_VELOCITY_STEP_SEC))?,
        tca: plan.tca,
    })
}

/// Shrink `dv` along its own direction to the smallest magnitude that still
/// reaches the target miss, staying inside the box.
fn shortest_along_ray<T: TrajectoryPropagator>(
    encounter: &Encounter<'_, T>,
    dv: Vec3,
    bound: f64,
    target_miss_km: f64,
) -> Option<Vec3> {
    let magnitude = vector::norm(dv);
    if magnitude <= 0.0 {
        return None;
    }
    let direction = vector::scale(dv, 1.0 / magnitude);
    let reaches = |s: f64| {
        encounter
            .miss(vector::scale(direction, s))
            .map(|m| m >= target_miss_km)
            .unwrap_or(false)
    };

    let s_max = direction
        .iter()
        .filter(|c| c.abs() > 0.0)
        .map(|c| bound / c.abs())
        .fold(f64::INFINITY, f64::min);
    if !s_max.is_finite() || !reaches(s_max) {
        return None;
    }

    let (mut lo, mut hi) = (0.0, s_max);
    for _ in 0..RAY_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if reaches(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(vector::scale(direction, hi).map(|c| c.clamp(-bound, bound)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conjunction::test_support::{CountingLinear, LinearObject, LinearTrajectory};
    use crate::propagation::KeplerPropagator;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};

    fn burn() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 2, 4, 0, 0).unwrap()
    }

    /// Own and threat fly in formation `offset_km` apart along x.
    fn formation(offset_km: f64) -> (LinearObject, LinearObject) {
        let own = LinearObject::new([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0], burn());
        let threat = LinearObject::new([7000.0 + offset_km, 0.0, 0.0], [0.0, 7.5, 0.0], burn());
        (own, threat)
    }

    fn plan(target_miss_km: f64) -> BurnPlan {
        BurnPlan {
            burn_time: burn(),
            tca: burn() + Duration::seconds(3600),
            target_miss_km,
        }
    }

    fn params(dv_bound_km_s: f64) -> ManeuverParams {
        ManeuverParams {
            dv_bound_km_s,
            ..ManeuverParams::default()
        }
    }

    #[test]
    fn zero_budget_means_zero_dv() {
        let (own, threat) = formation(1.0);
        let p = find_minimal_dv(
            &CountingLinear::default(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(3.0),
            &params(0.0),
        );
        assert_eq!(p.dv_vector_km_s, [0.0; 3]);
        assert!(!p.success);
        assert_abs_diff_eq!(p.predicted_miss_km, 1.0, epsilon = 1e-9);

        let p = find_minimal_dv(
            &CountingLinear::default(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(0.5),
            &params(0.0),
        );
        assert_eq!(p.dv_vector_km_s, [0.0; 3]);
        assert!(p.success);
    }

    #[test]
    fn already_safe_needs_no_burn() {
        let (own, threat) = formation(20.0);
        let p = find_minimal_dv(
            &CountingLinear::default(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(5.0),
            &params(0.002),
        );
        assert!(p.success);
        assert_eq!(p.dv_magnitude_km_s, 0.0);
    }

    #[test]
    fn reaches_target_with_near_minimal_dv() {
        let (own, threat) = formation(1.0);
        let p = find_minimal_dv(
            &CountingLinear::default(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(3.0),
            &params(0.005),
        );
        assert!(p.success, "{}", p.message);
        assert!(p.predicted_miss_km >= 3.0 - 0.001);

        let ideal = (3.0 - 1.0) / 3600.0;
        assert!(p.dv_magnitude_km_s >= ideal * 0.999);
        assert!(p.dv_magnitude_km_s <= ideal * 1.1);
        assert_abs_diff_eq!(p.dv_magnitude_m_s, p.dv_magnitude_km_s * 1000.0, epsilon = 1e-12);
        assert!(p.dv_vector_km_s.iter().all(|c| c.abs() <= 0.005));
    }

    #[test]
    fn larger_target_needs_more_dv() {
        let (own, threat) = formation(1.0);
        let dv_for = |target: f64| {
            let p = find_minimal_dv(
                &CountingLinear::default(),
                &LinearTrajectory,
                &threat,
                &own,
                &plan(target),
                &params(0.005),
            );
            assert!(p.success, "target {}: {}", target, p.message);
            p.dv_magnitude_km_s
        };

        let small = dv_for(3.0);
        let medium = dv_for(5.0);
        let large = dv_for(8.0);
        assert!(small <= medium);
        assert!(medium <= large);
    }

    #[test]
    fn unreachable_target_is_reported() {
        let (own, threat) = formation(1.0);
        // 0.0001 km/s for an hour moves at most ~0.62 km
        let p = find_minimal_dv(
            &CountingLinear::default(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(50.0),
            &params(0.0001),
        );
        assert!(!p.success);
        assert!(p.dv_vector_km_s.iter().all(|c| c.abs() <= 0.0001));
    }

    #[test]
    fn propagation_failure_gives_failed_proposal() {
        let (own, threat) = formation(1.0);
        let p = find_minimal_dv(
            &CountingLinear::failing(),
            &LinearTrajectory,
            &threat,
            &own,
            &plan(3.0),
            &params(0.002),
        );
        assert!(!p.success);
        assert_eq!(p.dv_vector_km_s, [0.0; 3]);
        assert!(p.message.contains("Propagation error"));
    }

    #[test]
    fn kepler_post_burn_opens_separation() {
        // both objects on the same circular two-body orbit
        let kepler = KeplerPropagator::default();
        let speed = (crate::propagation::EARTH_MU_KM3_S2 / 7000.0f64).sqrt();
        let orbit = Circular {
            kepler,
            epoch: burn(),
        };
        let object = ([7000.0, 0.0, 0.0], [0.0, speed, 0.0]);

        // the differenced burn-time velocity already drifts the coasting path
        let coasting = find_minimal_dv(&orbit, &kepler, &object, &object, &plan(0.0), &params(0.002));
        assert!(coasting.success);
        assert_eq!(coasting.dv_magnitude_km_s, 0.0);

        let target = coasting.predicted_miss_km + 2.0;
        let p = find_minimal_dv(&orbit, &kepler, &object, &object, &plan(target), &params(0.002));
        assert!(p.success, "{}", p.message);
        assert!(p.predicted_miss_km >= target - 0.001);
        assert!(p.dv_magnitude_km_s > 0.0);
    }

    struct Circular {
        kepler: KeplerPropagator,
        epoch: DateTime<Utc>,
    }

    impl Propagator for Circular {
        type Object = (Vec3, Vec3);

        fn position(&self, (r, v): &(Vec3, Vec3), at: DateTime<Utc>) -> Result<Vec3, PropagationError> {
            self.kepler.propagate_from(*r, *v, self.epoch, at)
        }
    }
}
