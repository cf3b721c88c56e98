use chrono::{DateTime, Utc};

use super::error::PropagationError;
use super::vector::{self, Vec3};
use super::{seconds_between, TrajectoryPropagator};

/// Earth gravitational parameter (km^3/s^2), WGS-84.
pub const EARTH_MU_KM3_S2: f64 = 398_600.4418;

const MAX_ITERATIONS: usize = 50;
const TOLERANCE: f64 = 1e-10;

/// Two-body propagation with universal variables.
///
/// Used for the maneuvering object after a burn: its original elements no
/// longer describe the orbit, so the state is propagated as a pure Kepler
/// problem from the post-burn position and velocity.
#[derive(Debug, Clone, Copy)]
pub struct KeplerPropagator {
    mu: f64,
}

impl Default for KeplerPropagator {
    fn default() -> Self {
        Self {
            mu: EARTH_MU_KM3_S2,
        }
    }
}

impl TrajectoryPropagator for KeplerPropagator {
    fn propagate_from(
        &self,
        position_km: Vec3,
        velocity_km_s: Vec3,
        epoch: DateTime<Utc>,
        target: DateTime<Utc>,
    ) -> Result<Vec3, PropagationError> {
        let dt = seconds_between(epoch, target);
        let r = propagate_universal(self.mu, position_km, velocity_km_s, dt)?;
        if !vector::is_finite(r) {
            return Err(PropagationError::NonFinite(target));
        }
        Ok(r)
    }
}

fn propagate_universal(mu: f64, r0: Vec3, v0: Vec3, dt: f64) -> Result<Vec3, PropagationError> {
    let r0n = vector::norm(r0);
    if r0n <= 0.0 || !r0n.is_finite() || !vector::is_finite(v0) {
        return Err(PropagationError::Kepler("degenerate initial state".into()));
    }
    if dt == 0.0 {
        return Ok(r0);
    }

    let sqrt_mu = mu.sqrt();
    let vr0 = vector::dot(r0, v0) / r0n;
    let alpha = 2.0 / r0n - vector::dot(v0, v0) / mu;

    let chi = solve_universal_anomaly(sqrt_mu, r0n, vr0, alpha, dt)?;
    let z = alpha * chi * chi;

    let f = 1.0 - chi * chi / r0n * stumpff_c(z);
    let g = dt - chi * chi * chi / sqrt_mu * stumpff_s(z);

    Ok(vector::add(vector::scale(r0, f), vector::scale(v0, g)))
}

fn solve_universal_anomaly(
    sqrt_mu: f64,
    r0: f64,
    vr0: f64,
    alpha: f64,
    dt: f64,
) -> Result<f64, PropagationError> {
    // Initial guess from Chobotov; exact for circular orbits.
    let mut chi = if alpha.abs() > 1e-12 {
        sqrt_mu * alpha.abs() * dt
    } else {
        sqrt_mu * dt / r0
    };

    for _ in 0..MAX_ITERATIONS {
        let chi2 = chi * chi;
        let z = alpha * chi2;
        let c = stumpff_c(z);
        let s = stumpff_s(z);

        let f = r0 * vr0 / sqrt_mu * chi2 * c + (1.0 - alpha * r0) * chi2 * chi * s + r0 * chi
            - sqrt_mu * dt;
        let df = r0 * vr0 / sqrt_mu * chi * (1.0 - z * s) + (1.0 - alpha * r0) * chi2 * c + r0;

        if !f.is_finite() || !df.is_finite() || df == 0.0 {
            break;
        }

        let step = f / df;
        chi -= step;
        if step.abs() <= TOLERANCE * chi.abs().max(1.0) {
            return Ok(chi);
        }
    }

    Err(PropagationError::Kepler(format!(
        "universal anomaly did not converge for dt={dt:.3}s"
    )))
}

fn stumpff_s(z: f64) -> f64 {
    if z > 1e-6 {
        let sz = z.sqrt();
        (sz - sz.sin()) / (sz * sz * sz)
    } else if z < -1e-6 {
        let sz = (-z).sqrt();
        (sz.sinh() - sz) / (sz * sz * sz)
    } else {
        1.0 / 6.0 - z / 120.0 + z * z / 5040.0
    }
}

fn stumpff_c(z: f64) -> f64 {
    if z > 1e-6 {
        (1.0 - z.sqrt().cos()) / z
    } else if z < -1e-6 {
        ((-z).sqrt().cosh() - 1.0) / (-z)
    } else {
        0.5 - z / 24.0 + z * z / 720.0
    }
}
