use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::conjunction::EventType;

const ALERTS_FILE: &str = "alerts.yaml";

/// One persisted alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertRecord {
    /// 1-based position within its alert set.
    pub id: u32,
    pub sat1_id: u32,
    pub sat2_id: u32,
    pub tca: DateTime<Utc>,
    pub miss_distance_km: f64,
    pub rel_velocity_km_s: f64,
    pub score: f64,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
}

/// Alerts produced by one screening run. Publishing a set replaces the
/// previous one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertSet {
    pub run_id: Uuid,
    pub reference_time: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub processed_pairs: usize,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub struct AlertStore {
    base: PathBuf,
}

impl AlertStore {
    pub fn new(base: PathBuf) -> Self {
        AlertStore { base }
    }

    fn alerts_path(&self) -> PathBuf {
        self.base.join(ALERTS_FILE)
    }

    /// Atomically replace the current alert set. The set is written to a
    /// temporary file next to the target and renamed over it, so readers see
    /// either the old set or the new one.
    pub fn replace(&self, set: &AlertSet) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.base)?;

        let yaml = serde_yaml::to_string(set)?;
        let tmp = self.base.join(format!(".alerts-{}.yaml.tmp", set.run_id));
        if let Err(e) = std::fs::write(&tmp, yaml) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp, self.alerts_path()) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            "Published alert set {} ({} alerts, {} pairs)",
            set.run_id,
            set.alerts.len(),
            set.processed_pairs
        );
        Ok(())
    }

    /// The most recently published set, if any.
    pub fn current(&self) -> Result<Option<AlertSet>, StorageError> {
        let path = self.alerts_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_yaml::from_str(&content) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                error!("Failed to parse alert set {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    /// Alerts of `event_type` from the current set, highest score first,
    /// earliest TCA breaking ties. Empty when nothing has been published.
    pub fn get_alerts(
        &self,
        limit: usize,
        event_type: EventType,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let Some(set) = self.current()? else {
            return Ok(Vec::new());
        };

        let mut alerts: Vec<AlertRecord> = set
            .alerts
            .into_iter()
            .filter(|a| a.event_type == event_type)
            .collect();
        alerts.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.tca.cmp(&b.tca)));
        alerts.truncate(limit);
        Ok(alerts)
    }
}
