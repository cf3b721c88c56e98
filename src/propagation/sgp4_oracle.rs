use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::PropagationError;
use super::vector::{self, Vec3};
use super::{finite_difference_state, Propagator, StateVector};
use crate::catalog::OrbitalObject;

/// Where screening takes object velocity from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocitySource {
    /// One second forward difference of two SGP4 positions.
    #[default]
    FiniteDifference,
    /// Velocity reported by SGP4 directly.
    Oracle,
}

/// SGP4/SDP4 propagation of catalog objects in the TEME frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sgp4Propagator {
    velocity: VelocitySource,
}

impl Sgp4Propagator {
    pub fn new(velocity: VelocitySource) -> Self {
        Self { velocity }
    }

    fn predict(
        &self,
        object: &OrbitalObject,
        at: DateTime<Utc>,
    ) -> Result<sgp4::Prediction, PropagationError> {
        let minutes = object
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PropagationError::Epoch(e.to_string()))?;

        let prediction = object.constants.propagate(minutes)?;

        if !vector::is_finite(prediction.position) || !vector::is_finite(prediction.velocity) {
            return Err(PropagationError::NonFinite(at));
        }
        Ok(prediction)
    }
}

impl Propagator for Sgp4Propagator {
    type Object = OrbitalObject;

    fn position(&self, object: &OrbitalObject, at: DateTime<Utc>) -> Result<Vec3, PropagationError> {
        self.predict(object, at).map(|p| p.position)
    }

    fn state(
        &self,
        object: &OrbitalObject,
        at: DateTime<Utc>,
    ) -> Result<StateVector, PropagationError> {
        match self.velocity {
            VelocitySource::FiniteDifference => finite_difference_state(self, object, at),
            VelocitySource::Oracle => {
                let prediction = self.predict(object, at)?;
                Ok(StateVector {
                    epoch: at,
                    position_km: prediction.position,
                    velocity_km_s: prediction.velocity,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_objects::{iss_nauka, iss_zarya};
    use chrono::Duration;

    #[test]
    fn iss_state_is_low_earth_orbit() {
        let iss = iss_zarya();
        let state = Sgp4Propagator::default().state(&iss, iss.epoch).unwrap();

        let radius = vector::norm(state.position_km);
        let speed = vector::norm(state.velocity_km_s);
        assert!(radius > 6600.0 && radius < 7000.0, "radius {radius}");
        assert!(speed > 7.4 && speed < 7.9, "speed {speed}");
    }

    #[test]
    fn finite_difference_close_to_oracle_velocity() {
        let iss = iss_zarya();
        let at = iss.epoch + Duration::minutes(45);
        let fd = Sgp4Propagator::new(VelocitySource::FiniteDifference)
            .state(&iss, at)
            .unwrap();
        let direct = Sgp4Propagator::new(VelocitySource::Oracle)
            .state(&iss, at)
            .unwrap();

        assert_eq!(fd.position_km, direct.position_km);
        assert!(vector::distance(fd.velocity_km_s, direct.velocity_km_s) < 0.01);
    }

    #[test]
    fn identical_elements_give_identical_positions() {
        let a = iss_zarya();
        let b = iss_nauka();
        let prop = Sgp4Propagator::default();
        let at = a.epoch + Duration::hours(1);

        let ra = prop.position(&a, at).unwrap();
        let rb = prop.position(&b, at).unwrap();
        assert!(vector::distance(ra, rb) < 1e-6);
    }
}
