//! Self-contained simulation run, executed by the headless runner.

use crate::engine::{ColonizationEngine, RunSummary};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use lichen_core::{Error, Result, RunConfig, RunId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument};

/// A run that can be executed to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LichenJob {
    pub run_id: RunId,
    pub config: RunConfig,
}

impl LichenJob {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            run_id: RunId::new(),
            config,
        })
    }

    /// Execute this job without observing intermediate state
    pub fn execute(self) -> Result<JobResult> {
        let started_at = Utc::now();
        let mut engine = ColonizationEngine::new(self.config.lichen.clone(), self.config.seed)?;
        let summary = engine.run(self.config.num_ticks)?;

        Ok(JobResult {
            run_id: self.run_id,
            summary,
            started_at,
            finished_at: Utc::now(),
            completed: true,
        })
    }

    /// Execute this job, handing a snapshot to `observer` before the first
    /// tick, every `frame_interval` ticks and after the last tick.
    ///
    /// `cancel` is read before every tick, so raising it stops the run
    /// within one tick; the observer then sees the state it stopped at.
    /// The run also stops once the observer returns false.
    #[instrument(skip(self, cancel, observer), fields(run_id = %self.run_id))]
    pub fn execute_observed<F>(
        self,
        frame_interval: u64,
        cancel: &AtomicBool,
        mut observer: F,
    ) -> Result<JobResult>
    where
        F: FnMut(Snapshot) -> bool,
    {
        if frame_interval == 0 {
            return Err(Error::InvalidConfiguration(
                "frame_interval must be positive".to_string(),
            ));
        }

        let started_at = Utc::now();
        let num_ticks = self.config.num_ticks;
        let mut engine = ColonizationEngine::new(self.config.lichen.clone(), self.config.seed)?;

        let mut keep_going = observer(engine.snapshot());
        let mut last_frame = engine.tick();
        while keep_going && engine.tick() < num_ticks {
            if cancel.load(Ordering::Relaxed) {
                if last_frame != engine.tick() {
                    observer(engine.snapshot());
                }
                info!(tick = engine.tick(), "Run cancelled");
                break;
            }
            engine.step()?;
            let tick = engine.tick();
            if tick % frame_interval == 0 || tick == num_ticks {
                keep_going = observer(engine.snapshot());
                last_frame = tick;
            }
        }

        let completed = engine.tick() == num_ticks;
        let summary = engine.summary();
        info!(
            event = "job_finished",
            completed = completed,
            total_ticks = summary.total_ticks,
            species_alive = summary.species_alive,
            speciations = summary.counters.speciations,
            extinctions = summary.counters.extinctions,
            "Lichen job finished"
        );

        Ok(JobResult {
            run_id: self.run_id,
            summary,
            started_at,
            finished_at: Utc::now(),
            completed,
        })
    }
}

/// Result from executing a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub run_id: RunId,
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False if the run was cancelled or the observer stopped it early
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lichen_core::{LichenConfig, SpeciationRate};

    fn run_config(num_ticks: u64) -> RunConfig {
        RunConfig {
            num_ticks,
            seed: 42,
            lichen: LichenConfig {
                side_length: 16,
                speciation: SpeciationRate::Fixed { probability: 0.2 },
                interaction_probability: 0.3,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_job_creation() {
        assert!(LichenJob::new(run_config(100)).is_ok());
        assert!(matches!(
            LichenJob::new(run_config(0)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_execute() {
        let job = LichenJob::new(run_config(200)).unwrap();
        let run_id = job.run_id;
        let result = job.execute().unwrap();

        assert_eq!(result.run_id, run_id);
        assert!(result.completed);
        assert_eq!(result.summary.total_ticks, 200);
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn test_observed_frames() {
        let job = LichenJob::new(run_config(25)).unwrap();
        let mut ticks = Vec::new();
        let result = job
            .execute_observed(10, &AtomicBool::new(false), |snapshot| {
                ticks.push(snapshot.tick);
                true
            })
            .unwrap();

        assert!(result.completed);
        assert_eq!(ticks, vec![0, 10, 20, 25]);
    }

    #[test]
    fn test_observer_stops_run() {
        let job = LichenJob::new(run_config(1000)).unwrap();
        let result = job
            .execute_observed(5, &AtomicBool::new(false), |snapshot| snapshot.tick < 15)
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.summary.total_ticks, 15);
    }

    #[test]
    fn test_observed_matches_unobserved() {
        let observed = LichenJob::new(run_config(300))
            .unwrap()
            .execute_observed(7, &AtomicBool::new(false), |_| true)
            .unwrap();
        let plain = LichenJob::new(run_config(300)).unwrap().execute().unwrap();

        assert_eq!(observed.summary.species_alive, plain.summary.species_alive);
        assert_eq!(observed.summary.counters.invasions, plain.summary.counters.invasions);
        assert_eq!(observed.summary.stats, plain.summary.stats);
    }

    #[test]
    fn test_zero_frame_interval() {
        let job = LichenJob::new(run_config(10)).unwrap();
        assert!(job
            .execute_observed(0, &AtomicBool::new(false), |_| true)
            .is_err());
    }

    #[test]
    fn test_cancel_between_frames() {
        // Frames are far apart; cancellation must not wait for the next one
        let job = LichenJob::new(run_config(5000)).unwrap();
        let cancel = AtomicBool::new(false);
        let mut ticks = Vec::new();
        let result = job
            .execute_observed(1000, &cancel, |snapshot| {
                ticks.push(snapshot.tick);
                cancel.store(true, Ordering::Relaxed);
                true
            })
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.summary.total_ticks, 0);
        assert_eq!(ticks, vec![0]);
    }

    #[test]
    fn test_cancel_mid_run() {
        let job = LichenJob::new(run_config(5000)).unwrap();
        let cancel = AtomicBool::new(false);
        let mut ticks = Vec::new();
        let result = job
            .execute_observed(10, &cancel, |snapshot| {
                ticks.push(snapshot.tick);
                if snapshot.tick == 20 {
                    cancel.store(true, Ordering::Relaxed);
                }
                true
            })
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.summary.total_ticks, 20);
        assert_eq!(ticks, vec![0, 10, 20]);
    }

    #[test]
    fn test_cancel_before_start() {
        let job = LichenJob::new(run_config(5000)).unwrap();
        let cancel = AtomicBool::new(true);
        let mut ticks = Vec::new();
        let result = job
            .execute_observed(10, &cancel, |snapshot| {
                ticks.push(snapshot.tick);
                true
            })
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.summary.total_ticks, 0);
        assert_eq!(ticks, vec![0]);
    }
}
