use chrono::{DateTime, Duration, Utc};

use super::{PropagationError, Propagator, StateVector};

/// Samples `object` from `start` to `end` inclusive every `step`.
pub fn sample_states<P: Propagator>(
    propagator: &P,
    object: &P::Object,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<Vec<StateVector>, PropagationError> {
    if step <= Duration::zero() {
        return Err(PropagationError::Epoch("sample step must be positive".into()));
    }

    let mut cursor = start;
    let mut states = Vec::new();

    while cursor <= end {
        states.push(propagator.state(object, cursor)?);
        cursor += step;
    }

    Ok(states)
}
