use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("epoch conversion failed: {0}")]
    Epoch(String),
    #[error("propagation model error: {0}")]
    Model(String),
    #[error("non-finite state at {0}")]
    NonFinite(DateTime<Utc>),
    #[error("two-body solver: {0}")]
    Kepler(String),
}

impl From<sgp4::Error> for PropagationError {
    fn from(err: sgp4::Error) -> Self {
        PropagationError::Model(err.to_string())
    }
}
