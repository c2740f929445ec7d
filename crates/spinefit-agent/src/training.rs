use std::sync::mpsc::{self, Receiver};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    AgentError, AgentMode, AgentReport, DescriptiveStats, EpisodeOutcome, GeneratedTarget,
    PostureGenerator, SolverAgent, TickClock,
};

/// One finished training episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRecord {
    pub episode: u64,
    pub posture: String,
    pub outcome: EpisodeOutcome,
    pub steps: u32,
    pub final_error: f32,
    pub total_reward: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub successes: usize,
    pub timeouts: usize,
    pub stagnations: usize,
    /// Episodes cut off by the frame budget.
    pub truncated: usize,
    pub steps: Option<DescriptiveStats>,
    pub rewards: Option<DescriptiveStats>,
    pub final_errors: Option<DescriptiveStats>,
}

impl TrainingSummary {
    #[must_use]
    pub fn from_records(records: &[EpisodeRecord], truncated: usize) -> Self {
        let count = |outcome: EpisodeOutcome| {
            records.iter().filter(|r| r.outcome == outcome).count()
        };
        #[expect(clippy::cast_precision_loss)]
        let steps = DescriptiveStats::new(records.iter().map(|r| r.steps as f32));
        Self {
            episodes: records.len() + truncated,
            successes: count(EpisodeOutcome::Succeeded),
            timeouts: count(EpisodeOutcome::TimedOut),
            stagnations: count(EpisodeOutcome::Stagnated),
            truncated,
            steps,
            rewards: DescriptiveStats::new(records.iter().map(|r| r.total_reward)),
            final_errors: DescriptiveStats::new(records.iter().map(|r| r.final_error)),
        }
    }
}

/// Training loop for a single agent with its own posture generator.
///
/// A success moves on to a freshly generated target; a timeout or stagnation
/// retries the same target.
#[derive(Debug)]
pub struct Trainer {
    generator: PostureGenerator,
    agent: SolverAgent,
    reports: Receiver<AgentReport>,
    current: Option<GeneratedTarget>,
    records: Vec<EpisodeRecord>,
    truncated: usize,
}

impl Trainer {
    pub fn new(generator: PostureGenerator, mut agent: SolverAgent) -> Result<Self, AgentError> {
        agent.set_mode(AgentMode::Training)?;
        let (tx, rx) = mpsc::channel();
        agent.set_reporter(tx);
        Ok(Self {
            generator,
            agent,
            reports: rx,
            current: None,
            records: Vec::new(),
            truncated: 0,
        })
    }

    #[must_use]
    pub fn agent(&self) -> &SolverAgent {
        &self.agent
    }

    #[must_use]
    pub fn records(&self) -> &[EpisodeRecord] {
        &self.records
    }

    /// Target the next episode will use, if one is pending.
    #[must_use]
    pub fn current_target(&self) -> Option<&GeneratedTarget> {
        self.current.as_ref()
    }

    /// Runs one episode, generating a new target first when needed.
    ///
    /// Returns `None` when the episode hit `max_frames` before finishing.
    pub fn run_episode(
        &mut self,
        clock: &mut TickClock,
        max_frames: u64,
    ) -> Result<Option<EpisodeRecord>, AgentError> {
        let target = match &self.current {
            Some(current) => current.clone(),
            None => {
                let generated = self.generator.generate(clock)?;
                self.current = Some(generated.clone());
                generated
            }
        };
        self.agent.start(target.target)?;

        let start = clock.frame();
        loop {
            let tick = clock.next_tick();
            self.agent.on_tick(tick);
            if let Ok(report) = self.reports.try_recv() {
                let record = EpisodeRecord {
                    episode: report.episode,
                    posture: target.posture.clone(),
                    outcome: report.outcome,
                    steps: report.steps,
                    final_error: report.total_error,
                    total_reward: report.total_reward,
                };
                if record.outcome.is_succeeded() {
                    self.current = None;
                }
                info!(
                    episode = record.episode,
                    posture = %record.posture,
                    outcome = %record.outcome,
                    steps = record.steps,
                    error = record.final_error,
                    reward = record.total_reward,
                    "episode finished"
                );
                self.records.push(record.clone());
                return Ok(Some(record));
            }
            if let Some(err) = self.agent.fault() {
                return Err(err.clone());
            }
            if tick.frame.saturating_sub(start) >= max_frames {
                warn!(max_frames, "episode truncated by frame budget");
                self.agent.cancel();
                self.truncated += 1;
                return Ok(None);
            }
        }
    }

    pub fn run(
        &mut self,
        clock: &mut TickClock,
        episodes: usize,
        max_frames: u64,
    ) -> Result<TrainingSummary, AgentError> {
        for _ in 0..episodes {
            self.run_episode(clock, max_frames)?;
        }
        Ok(self.summary())
    }

    #[must_use]
    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary::from_records(&self.records, self.truncated)
    }
}
