use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::abort::AbortHandle;
use crate::alerts::{AlertRecord, AlertSet, AlertStore, StorageError};
use crate::conjunction::analysis::analyze_pair;
use crate::conjunction::pruner::prune_pairs;
use crate::conjunction::types::{
    CandidatePair, ConjunctionEvent, EventType, PairOutcome, ScreeningParams,
};
use crate::propagation::{Propagator, StateVector};

#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("Screening run aborted")]
    Aborted,
    #[error("Could not build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Could not publish alerts: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    Completed,
    /// Fewer than two objects had a usable state; nothing was published.
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScreeningSummary {
    /// Identifier of the published alert set, absent when nothing was published.
    pub run_id: Option<Uuid>,
    pub status: ScreeningStatus,
    pub processed_pairs: usize,
    pub alerts_saved: usize,
    pub objects_used: usize,
    pub objects_excluded: usize,
    pub skipped_pairs: usize,
}

/// Everything one pass over the catalog produced, before the save policy.
#[derive(Debug, Clone, Default)]
pub struct ScreeningReport {
    pub events: Vec<ConjunctionEvent>,
    pub processed_pairs: usize,
    pub skipped_pairs: usize,
    pub objects_used: usize,
    pub objects_excluded: usize,
}

pub struct ScreeningEngine<P: Propagator> {
    propagator: P,
    params: ScreeningParams,
    pool: Option<rayon::ThreadPool>,
}

impl<P: Propagator> ScreeningEngine<P> {
    pub fn new(propagator: P, params: ScreeningParams) -> Self {
        Self {
            propagator,
            params,
            pool: None,
        }
    }

    /// Run the narrow phase on a dedicated pool of `workers` threads instead
    /// of the global rayon pool.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, ScreeningError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("screening-{}", i))
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Snapshot, prune and analyse. Returns every event, saved or not.
    pub fn screen<'a, I>(
        &self,
        objects: I,
        reference_time: DateTime<Utc>,
        abort: &AbortHandle,
    ) -> Result<ScreeningReport, ScreeningError>
    where
        I: IntoIterator<Item = (u32, &'a P::Object)>,
        P::Object: 'a,
    {
        let mut snapshot: BTreeMap<u32, (&P::Object, StateVector)> = BTreeMap::new();
        let mut objects_excluded = 0;

        for (id, object) in objects {
            match self.propagator.state(object, reference_time) {
                Ok(state) => {
                    snapshot.insert(id, (object, state));
                }
                Err(e) => {
                    warn!("Excluding object {} from screening: {}", id, e);
                    objects_excluded += 1;
                }
            }
        }

        let mut report = ScreeningReport {
            objects_used: snapshot.len(),
            objects_excluded,
            ..Default::default()
        };
        if snapshot.len() < 2 {
            return Ok(report);
        }

        let positions: BTreeMap<u32, _> = snapshot
            .iter()
            .map(|(id, (_, state))| (*id, state.position_km))
            .collect();
        let pairs: Vec<CandidatePair> = prune_pairs(&positions, self.params.prune_radius_km)
            .into_iter()
            .collect();
        info!(
            "Screening {} objects at {}: {} candidate pairs within {} km",
            snapshot.len(),
            reference_time,
            pairs.len(),
            self.params.prune_radius_km
        );

        let analyse = || -> Vec<Option<PairOutcome>> {
            pairs
                .par_iter()
                .map(|pair| {
                    if abort.is_aborted() {
                        return None;
                    }
                    let first = snapshot.get(&pair.first())?;
                    let second = snapshot.get(&pair.second())?;
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        analyze_pair(
                            &self.propagator,
                            *pair,
                            (first.0, &first.1),
                            (second.0, &second.1),
                            reference_time,
                            &self.params,
                        )
                    }))
                    .unwrap_or_else(|_| PairOutcome::Skipped {
                        pair: *pair,
                        reason: "analysis panicked".into(),
                    });
                    Some(outcome)
                })
                .collect()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(analyse),
            None => analyse(),
        };

        if abort.is_aborted() {
            return Err(ScreeningError::Aborted);
        }

        for outcome in outcomes.into_iter().flatten() {
            report.processed_pairs += 1;
            match outcome {
                PairOutcome::Event(event) => report.events.push(event),
                PairOutcome::Skipped { pair, reason } => {
                    warn!("Skipping pair {}: {}", pair, reason);
                    report.skipped_pairs += 1;
                }
            }
        }

        Ok(report)
    }

    /// Full run: screen, apply the save policy and publish the result as the
    /// new alert set.
    pub fn run_screening<'a, I>(
        &self,
        objects: I,
        reference_time: DateTime<Utc>,
        store: &AlertStore,
        abort: &AbortHandle,
    ) -> Result<ScreeningSummary, ScreeningError>
    where
        I: IntoIterator<Item = (u32, &'a P::Object)>,
        P::Object: 'a,
    {
        let report = self.screen(objects, reference_time, abort)?;

        if report.objects_used < 2 {
            warn!(
                "Only {} usable objects at {}, nothing to screen",
                report.objects_used, reference_time
            );
            return Ok(ScreeningSummary {
                run_id: None,
                status: ScreeningStatus::InsufficientData,
                processed_pairs: 0,
                alerts_saved: 0,
                objects_used: report.objects_used,
                objects_excluded: report.objects_excluded,
                skipped_pairs: 0,
            });
        }

        let created_at = Utc::now();
        let alerts: Vec<AlertRecord> = report
            .events
            .iter()
            .filter(|e| should_save(e, &self.params))
            .zip(1..)
            .map(|(e, id)| AlertRecord {
                id,
                sat1_id: e.sat1_id,
                sat2_id: e.sat2_id,
                tca: e.tca,
                miss_distance_km: e.miss_distance_km,
                rel_velocity_km_s: e.rel_velocity_km_s,
                score: e.score,
                event_type: e.event_type,
                created_at,
            })
            .collect();
        debug!(
            "{} of {} events pass the save policy",
            alerts.len(),
            report.events.len()
        );

        if abort.is_aborted() {
            return Err(ScreeningError::Aborted);
        }

        let set = AlertSet {
            run_id: Uuid::new_v4(),
            reference_time,
            generated_at: created_at,
            processed_pairs: report.processed_pairs,
            alerts,
        };
        store.replace(&set)?;

        Ok(ScreeningSummary {
            run_id: Some(set.run_id),
            status: ScreeningStatus::Completed,
            processed_pairs: report.processed_pairs,
            alerts_saved: set.alerts.len(),
            objects_used: report.objects_used,
            objects_excluded: report.objects_excluded,
            skipped_pairs: report.skipped_pairs,
        })
    }
}

/// Docking events are always kept; collisions only when they carry risk
/// and pass within the save threshold.
pub fn should_save(event: &ConjunctionEvent, params: &ScreeningParams) -> bool {
    match event.event_type {
        EventType::Docking => true,
        EventType::Collision => {
            event.score > 0.0 && event.miss_distance_km < params.save_threshold_km
        }
    }
}
