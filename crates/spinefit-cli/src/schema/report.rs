use chrono::{DateTime, Utc};
use serde::Serialize;
use spinefit_agent::{EpisodeRecord, RaceOutcome, RaceSummary, TrainingSummary};
use spinefit_body::{PostureFault, RegionCurvature};
use spinefit_sensor::TargetVector;

/// Result of `spinefit race`.
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    /// Timestamp when the race finished (ISO 8601 format)
    pub recorded_at: DateTime<Utc>,
    pub seed: u64,
    pub agents: usize,
    pub result: RaceResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RaceResult {
    Won(RaceSummary),
    Exhausted {
        posture: String,
        target: TargetVector,
        frames_elapsed: u64,
    },
    /// The frame budget ran out before any agent finished.
    FrameLimit { max_frames: u64 },
    Failed { error: String },
}

impl RaceResult {
    pub fn from_outcome(outcome: Option<RaceOutcome>, max_frames: u64) -> Self {
        match outcome {
            Some(RaceOutcome::Won(summary)) => Self::Won(summary),
            Some(RaceOutcome::Exhausted {
                posture,
                target,
                frames_elapsed,
                ..
            }) => Self::Exhausted {
                posture,
                target,
                frames_elapsed,
            },
            Some(RaceOutcome::Failed(err)) => Self::Failed {
                error: err.to_string(),
            },
            None => Self::FrameLimit { max_frames },
        }
    }
}

/// Result of `spinefit train`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub recorded_at: DateTime<Utc>,
    pub seed: u64,
    pub summary: TrainingSummary,
    pub episodes: Vec<EpisodeRecord>,
}

/// Result of `spinefit inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub seed: u64,
    pub posture: String,
    pub target: TargetVector,
    pub curvature: RegionCurvature,
    pub faults: Vec<String>,
}

impl InspectReport {
    pub fn fault_names(faults: &[PostureFault]) -> Vec<String> {
        faults.iter().map(ToString::to_string).collect()
    }
}
