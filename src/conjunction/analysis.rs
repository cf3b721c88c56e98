use chrono::{DateTime, Utc};

use crate::conjunction::minimize::minimize_bounded;
use crate::conjunction::types::{
    CandidatePair, ConjunctionEvent, EventType, PairOutcome, ScreeningParams,
};
use crate::propagation::vector::{self, Vec3};
use crate::propagation::{seconds, Propagator, StateVector};

/// Relative speeds below this are treated as co-moving (km²/s²).
const PARALLEL_VV_EPS: f64 = 1e-12;
/// Cost returned for offsets the propagator cannot evaluate (km²).
const FAILED_COST: f64 = 1e9;
/// Miss distance reported when the refined TCA cannot be propagated (km).
pub const UNRESOLVED_MISS_KM: f64 = 99_999.9;
const REFINE_XATOL_SEC: f64 = 0.01;
const REFINE_MAX_EVALUATIONS: usize = 500;
const REL_VELOCITY_STEP_SEC: f64 = 0.1;

/// Linear-motion estimate of closest approach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticEstimate {
    /// Offset from the reference epoch, seconds.
    pub tstar_sec: f64,
    pub miss_km: f64,
}

/// Closest approach found by propagating both objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    pub tca: DateTime<Utc>,
    pub miss_km: f64,
    pub rel_velocity_km_s: f64,
}

pub fn analytic_tca_and_miss(r1: Vec3, v1: Vec3, r2: Vec3, v2: Vec3) -> AnalyticEstimate {
    let r = vector::sub(r2, r1);
    let v = vector::sub(v2, v1);
    let vv = vector::dot(v, v);

    if vv < PARALLEL_VV_EPS {
        return AnalyticEstimate {
            tstar_sec: 0.0,
            miss_km: vector::norm(r),
        };
    }

    let tstar = -vector::dot(r, v) / vv;
    AnalyticEstimate {
        tstar_sec: tstar,
        miss_km: vector::norm(vector::add(r, vector::scale(v, tstar))),
    }
}

/// Search `±search_radius_sec` around `epoch + tstar_sec` for the true
/// closest approach, then measure miss distance and relative speed there.
///
/// `None` when the bounded search exhausts its evaluation budget.
pub fn refine_tca<P: Propagator>(
    propagator: &P,
    object1: &P::Object,
    object2: &P::Object,
    epoch: DateTime<Utc>,
    tstar_sec: f64,
    search_radius_sec: f64,
) -> Option<Refinement> {
    let distance_sq = |offset: f64| {
        let t = epoch + seconds(tstar_sec + offset);
        match (propagator.position(object1, t), propagator.position(object2, t)) {
            (Ok(r1), Ok(r2)) => {
                let d = vector::distance_squared(r1, r2);
                if d.is_finite() {
                    d
                } else {
                    FAILED_COST
                }
            }
            _ => FAILED_COST,
        }
    };

    let best = minimize_bounded(
        distance_sq,
        -search_radius_sec,
        search_radius_sec,
        REFINE_XATOL_SEC,
        REFINE_MAX_EVALUATIONS,
    );
    if !best.converged {
        log::debug!(
            "TCA search stopped after {} evaluations at offset {:.3} s (d² = {:.3e})",
            best.evaluations,
            best.x,
            best.value
        );
        return None;
    }

    let tca = epoch + seconds(tstar_sec + best.x);
    Some(measure_at(propagator, object1, object2, tca))
}

fn measure_at<P: Propagator>(
    propagator: &P,
    object1: &P::Object,
    object2: &P::Object,
    tca: DateTime<Utc>,
) -> Refinement {
    let later = tca + seconds(REL_VELOCITY_STEP_SEC);
    let measured = (|| {
        let r1 = propagator.position(object1, tca)?;
        let r2 = propagator.position(object2, tca)?;
        let r1_f = propagator.position(object1, later)?;
        let r2_f = propagator.position(object2, later)?;
        Ok::<_, crate::propagation::PropagationError>((r1, r2, r1_f, r2_f))
    })();

    match measured {
        Ok((r1, r2, r1_f, r2_f)) => {
            let rel_now = vector::sub(r2, r1);
            let rel_later = vector::sub(r2_f, r1_f);
            Refinement {
                tca,
                miss_km: vector::norm(rel_now),
                rel_velocity_km_s: vector::norm(vector::sub(rel_later, rel_now))
                    / REL_VELOCITY_STEP_SEC,
            }
        }
        Err(e) => {
            log::debug!("propagation failed at refined TCA {}: {}", tca, e);
            Refinement {
                tca,
                miss_km: UNRESOLVED_MISS_KM,
                rel_velocity_km_s: 0.0,
            }
        }
    }
}

/// Piecewise-linear risk in [0, 1]: 1 inside the critical distance, 0 beyond
/// the monitoring threshold, linear in between.
pub fn score_miss_distance(miss_km: f64, params: &ScreeningParams) -> f64 {
    let monitoring = params.monitoring_threshold_km;
    let critical = params.critical_distance_km;

    if miss_km > monitoring {
        0.0
    } else if miss_km <= critical {
        1.0
    } else {
        ((monitoring - miss_km) / (monitoring - critical)).clamp(0.0, 1.0)
    }
}

pub fn classify(miss_km: f64, rel_velocity_km_s: f64, params: &ScreeningParams) -> EventType {
    if miss_km < params.docking_distance_km && rel_velocity_km_s < params.docking_rel_velocity_km_s
    {
        EventType::Docking
    } else {
        EventType::Collision
    }
}

/// Narrow phase for one candidate pair, from both objects' states at `epoch`.
pub fn analyze_pair<P: Propagator>(
    propagator: &P,
    pair: CandidatePair,
    (object1, state1): (&P::Object, &StateVector),
    (object2, state2): (&P::Object, &StateVector),
    epoch: DateTime<Utc>,
    params: &ScreeningParams,
) -> PairOutcome {
    let estimate = analytic_tca_and_miss(
        state1.position_km,
        state1.velocity_km_s,
        state2.position_km,
        state2.velocity_km_s,
    );
    if !estimate.tstar_sec.is_finite() || !estimate.miss_km.is_finite() {
        return PairOutcome::Skipped {
            pair,
            reason: "non-finite analytic estimate".into(),
        };
    }

    if estimate.tstar_sec.abs() > params.analytic_window_sec
        || estimate.miss_km > 2.0 * params.monitoring_threshold_km
    {
        let tca = epoch
            .checked_add_signed(seconds(estimate.tstar_sec))
            .unwrap_or(epoch);
        return PairOutcome::Event(ConjunctionEvent {
            sat1_id: pair.first(),
            sat2_id: pair.second(),
            tca,
            miss_distance_km: estimate.miss_km,
            rel_velocity_km_s: vector::distance(state2.velocity_km_s, state1.velocity_km_s),
            score: 0.0,
            event_type: EventType::Collision,
        });
    }

    let Some(refined) = refine_tca(
        propagator,
        object1,
        object2,
        epoch,
        estimate.tstar_sec,
        params.search_radius_sec,
    ) else {
        return PairOutcome::Skipped {
            pair,
            reason: "TCA refinement hit its evaluation limit".into(),
        };
    };

    let event_type = classify(refined.miss_km, refined.rel_velocity_km_s, params);
    let score = match event_type {
        EventType::Docking => 1.0,
        EventType::Collision => score_miss_distance(refined.miss_km, params),
    };

    PairOutcome::Event(ConjunctionEvent {
        sat1_id: pair.first(),
        sat2_id: pair.second(),
        tca: refined.tca,
        miss_distance_km: refined.miss_km,
        rel_velocity_km_s: refined.rel_velocity_km_s,
        score,
        event_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conjunction::test_support::{CountingLinear, LinearObject};
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 2, 5, 0, 0).unwrap()
    }

    fn state(object: &LinearObject) -> StateVector {
        StateVector {
            epoch: object.epoch,
            position_km: object.position_km,
            velocity_km_s: object.velocity_km_s,
        }
    }

    fn event(outcome: PairOutcome) -> ConjunctionEvent {
        match outcome {
            PairOutcome::Event(e) => e,
            PairOutcome::Skipped { reason, .. } => panic!("pair skipped: {reason}"),
        }
    }

    #[test]
    fn analytic_co_moving_objects() {
        let est = analytic_tca_and_miss([1.0, 2.0, 3.0], [7.0, 0.0, 0.0], [4.0, 6.0, 3.0], [7.0, 0.0, 0.0]);
        assert_eq!(est.tstar_sec, 0.0);
        assert_abs_diff_eq!(est.miss_km, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn analytic_head_on() {
        // 100 km apart along x, closing at 2 km/s, offset 3 km in y
        let est = analytic_tca_and_miss([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [100.0, 3.0, 0.0], [-1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(est.tstar_sec, 50.0, epsilon = 1e-12);
        assert_abs_diff_eq!(est.miss_km, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn score_breakpoints() {
        let params = ScreeningParams::default();
        assert_eq!(score_miss_distance(10.0, &params), 1.0);
        assert_eq!(score_miss_distance(75.0, &params), 0.0);
        assert_abs_diff_eq!(score_miss_distance(42.5, &params), 0.5, epsilon = 1e-12);
        assert_eq!(score_miss_distance(0.0, &params), 1.0);
        assert_eq!(score_miss_distance(200.0, &params), 0.0);
    }

    #[test]
    fn docking_classification() {
        let params = ScreeningParams::default();
        assert_eq!(classify(0.0054, 0.0002, &params), EventType::Docking);
        assert_eq!(classify(0.0054, 0.5, &params), EventType::Collision);
        assert_eq!(classify(1.0, 0.0, &params), EventType::Collision);
    }

    #[test]
    fn docking_pair_scores_one() {
        let prop = CountingLinear::default();
        let a = LinearObject::new([6800.0, 0.0, 0.0], [0.0, 7.66, 0.0], epoch());
        let b = LinearObject::new([6800.0, 0.0054, 0.0], [0.0, 7.66, 0.0002], epoch());
        let pair = CandidatePair::new(25544, 49044).unwrap();

        let e = event(analyze_pair(
            &prop,
            pair,
            (&a, &state(&a)),
            (&b, &state(&b)),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_eq!(e.event_type, EventType::Docking);
        assert_eq!(e.score, 1.0);
        assert!(e.miss_distance_km < 0.006);
    }

    #[test]
    fn gate_skips_refinement_for_distant_tca() {
        let prop = CountingLinear::default();
        // closing at 0.01 km/s from 100 km: t* = 10000 s
        let a = LinearObject::new([0.0, 7000.0, 0.0], [0.0, 0.0, 0.0], epoch());
        let b = LinearObject::new([100.0, 7000.0, 0.0], [-0.01, 0.0, 0.0], epoch());
        let pair = CandidatePair::new(1, 2).unwrap();

        let e = event(analyze_pair(
            &prop,
            pair,
            (&a, &state(&a)),
            (&b, &state(&b)),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_eq!(e.score, 0.0);
        assert_eq!(e.event_type, EventType::Collision);
        assert_eq!(e.tca, epoch() + chrono::Duration::seconds(10_000));
        assert_eq!(prop.calls(), 0);
    }

    #[test]
    fn gate_skips_refinement_for_large_miss() {
        let prop = CountingLinear::default();
        let a = LinearObject::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], epoch());
        let b = LinearObject::new([0.0, 200.0, 0.0], [-1.0, 0.0, 0.0], epoch());

        let e = event(analyze_pair(
            &prop,
            CandidatePair::new(1, 2).unwrap(),
            (&a, &state(&a)),
            (&b, &state(&b)),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_eq!(e.score, 0.0);
        assert_abs_diff_eq!(e.miss_distance_km, 200.0, epsilon = 1e-9);
        assert_eq!(prop.calls(), 0);
    }

    #[test]
    fn stationary_pair_fifty_km_apart() {
        let prop = CountingLinear::default();
        let a = LinearObject::new([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0], epoch());
        let b = LinearObject::new([7050.0, 0.0, 0.0], [0.0, 7.5, 0.0], epoch());

        let e = event(analyze_pair(
            &prop,
            CandidatePair::new(2, 1).unwrap(),
            (&a, &state(&a)),
            (&b, &state(&b)),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_eq!(e.event_type, EventType::Collision);
        assert_abs_diff_eq!(e.miss_distance_km, 50.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.score, 25.0 / 65.0, epsilon = 1e-6);
        assert!(prop.calls() > 0);
    }

    #[test]
    fn refinement_corrects_linear_estimate() {
        let prop = CountingLinear::default();
        // head-on at 2 km/s, closest approach 40 s after epoch with 3 km miss
        let a = LinearObject::new([0.0, 7000.0, 0.0], [1.0, 0.0, 0.0], epoch());
        let b = LinearObject::new([80.0, 7003.0, 0.0], [-1.0, 0.0, 0.0], epoch());
        // stale snapshot for b puts the linear estimate 120 s late
        let biased = StateVector {
            position_km: [80.0 + 240.0, 7003.0, 0.0],
            ..state(&b)
        };

        let e = event(analyze_pair(
            &prop,
            CandidatePair::new(1, 2).unwrap(),
            (&a, &state(&a)),
            (&b, &biased),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_abs_diff_eq!(
            crate::propagation::seconds_between(epoch(), e.tca),
            40.0,
            epsilon = 0.05
        );
        assert_abs_diff_eq!(e.miss_distance_km, 3.0, epsilon = 1e-3);
        assert_abs_diff_eq!(e.rel_velocity_km_s, 2.0, epsilon = 1e-6);
        assert_eq!(e.score, 1.0);
    }

    #[test]
    fn propagation_failure_at_tca_reports_sentinel() {
        let prop = CountingLinear::failing();
        let a = LinearObject::new([0.0, 7000.0, 0.0], [1.0, 0.0, 0.0], epoch());
        let b = LinearObject::new([20.0, 7003.0, 0.0], [-1.0, 0.0, 0.0], epoch());

        let e = event(analyze_pair(
            &prop,
            CandidatePair::new(1, 2).unwrap(),
            (&a, &state(&a)),
            (&b, &state(&b)),
            epoch(),
            &ScreeningParams::default(),
        ));
        assert_eq!(e.miss_distance_km, UNRESOLVED_MISS_KM);
        assert_eq!(e.rel_velocity_km_s, 0.0);
        assert_eq!(e.score, 0.0);
    }
}
