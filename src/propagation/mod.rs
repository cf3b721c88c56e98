mod error;
mod kepler;
mod sgp4_oracle;
mod trajectory;
pub mod vector;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

pub use error::PropagationError;
pub use kepler::{KeplerPropagator, EARTH_MU_KM3_S2};
pub use sgp4_oracle::{Sgp4Propagator, VelocitySource};
pub use trajectory::sample_states;
pub use vector::Vec3;

/// Forward-difference step used to derive velocity from two position samples.
pub const VELOCITY_DIFFERENCE_SECONDS: f64 = 1.0;

/// Position and velocity of one object at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct StateVector {
    pub epoch: DateTime<Utc>,
    #[schema(value_type = Vec<f64>)]
    pub position_km: Vec3,
    #[schema(value_type = Vec<f64>)]
    pub velocity_km_s: Vec3,
}

/// Maps an object's orbital state and an absolute time to an inertial position.
///
/// Implementations must be callable from several threads at once with
/// independent arguments; the screening loop fans pairs out over a pool.
pub trait Propagator: Send + Sync {
    type Object: Send + Sync;

    fn position(
        &self,
        object: &Self::Object,
        at: DateTime<Utc>,
    ) -> Result<Vec3, PropagationError>;

    /// Position and velocity at `at`. The default derives velocity with a
    /// one second forward difference of [`Propagator::position`].
    fn state(
        &self,
        object: &Self::Object,
        at: DateTime<Utc>,
    ) -> Result<StateVector, PropagationError> {
        finite_difference_state(self, object, at)
    }
}

/// Propagates a free state (after an impulsive burn) to a target time.
pub trait TrajectoryPropagator: Send + Sync {
    fn propagate_from(
        &self,
        position_km: Vec3,
        velocity_km_s: Vec3,
        epoch: DateTime<Utc>,
        target: DateTime<Utc>,
    ) -> Result<Vec3, PropagationError>;
}

pub fn finite_difference_state<P: Propagator + ?Sized>(
    propagator: &P,
    object: &P::Object,
    at: DateTime<Utc>,
) -> Result<StateVector, PropagationError> {
    let r0 = propagator.position(object, at)?;
    let r1 = propagator.position(object, at + seconds(VELOCITY_DIFFERENCE_SECONDS))?;
    let velocity = vector::scale(vector::sub(r1, r0), 1.0 / VELOCITY_DIFFERENCE_SECONDS);

    Ok(StateVector {
        epoch: at,
        position_km: r0,
        velocity_km_s: velocity,
    })
}

/// Fractional seconds as a chrono duration, rounded to the nanosecond.
pub fn seconds(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1e9).round() as i64)
}

/// Signed seconds from `from` to `to`.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    struct Linear;

    impl Propagator for Linear {
        type Object = (Vec3, Vec3, DateTime<Utc>);

        fn position(
            &self,
            (r0, v, t0): &Self::Object,
            at: DateTime<Utc>,
        ) -> Result<Vec3, PropagationError> {
            Ok(vector::add(*r0, vector::scale(*v, seconds_between(*t0, at))))
        }
    }

    #[test]
    fn finite_difference_recovers_linear_velocity() {
        let t0 = Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap();
        let object = ([7000.0, 0.0, 0.0], [0.0, 7.5, 0.1], t0);
        let state = Linear.state(&object, t0 + Duration::seconds(30)).unwrap();

        assert_abs_diff_eq!(state.position_km[1], 225.0, epsilon = 1e-9);
        assert_abs_diff_eq!(state.velocity_km_s[1], 7.5, epsilon = 1e-9);
        assert_abs_diff_eq!(state.velocity_km_s[2], 0.1, epsilon = 1e-9);
    }

    #[test]
    fn seconds_round_trip() {
        let t0 = Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap();
        let t1 = t0 + seconds(-1234.5678);
        assert_abs_diff_eq!(seconds_between(t0, t1), -1234.5678, epsilon = 1e-9);
    }
}
