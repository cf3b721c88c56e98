use chrono::{DateTime, Utc};
use serde::Serialize;
use sgp4::{Constants, Elements};
use utoipa::ToSchema;

/// A tracked object as ingested from a TLE set. Immutable once loaded.
pub struct OrbitalObject {
    pub id: u32,
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub source: String,
    pub elements: Elements,
    pub constants: Constants,
}

impl OrbitalObject {
    pub fn summary(&self) -> ObjectSummary {
        ObjectSummary {
            id: self.id,
            name: self.name.clone(),
            epoch: self.epoch,
            source: self.source.clone(),
        }
    }
}

/// Serializable view of an [`OrbitalObject`] without its element set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObjectSummary {
    pub id: u32,
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub source: String,
}
