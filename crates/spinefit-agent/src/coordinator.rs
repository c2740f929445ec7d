//! Winner-take-all arbitration between solver agents.
//!
//! A race goes through three states:
//!
//! - **inactive** - nothing running; [`RaceCoordinator::run_race`] starts one
//! - **generating** - the posture generator is producing the shared target
//! - **running** - every agent works on the target in inference mode
//!
//! Agents report terminal outcomes over an mpsc channel. The coordinator
//! drains that channel after each individual agent has handled a tick, so
//! the first success is acted on before any later agent gets to run: the
//! race goes inactive, all other agents are cancelled and the winner's
//! controlled-joint rotations are copied into the [`PoseSink`]. Reports that
//! arrive while no race is running are discarded.

use std::sync::mpsc::{self, Receiver, Sender};

use nalgebra::Vector3;
use serde::Serialize;
use spinefit_sensor::{SensorReading, TargetVector};
use tracing::{debug, error, info, warn};

use crate::{
    AgentError, AgentId, AgentMode, AgentReport, EpisodeOutcome, GeneratedTarget, PoseSink,
    PostureGenerator, SolverAgent, Tick, TickClock, copy_pose,
};

#[derive(Debug, Clone, PartialEq, derive_more::IsVariant)]
pub enum RaceStart {
    Started,
    /// A race was already in progress; the call had no effect.
    AlreadyRunning,
    /// The generator refused to start.
    Failed(AgentError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub race: u64,
    pub winner: AgentId,
    pub posture: String,
    pub steps: u32,
    pub reading: SensorReading,
    pub target: TargetVector,
    pub total_error: f32,
    pub rotations: Vec<Vector3<f32>>,
    pub frames_elapsed: u64,
    /// Number of sink slots written.
    pub slots_written: usize,
}

#[derive(Debug, Clone, PartialEq, derive_more::IsVariant)]
pub enum RaceOutcome {
    Won(RaceSummary),
    /// Every agent finished without matching the target.
    Exhausted {
        race: u64,
        posture: String,
        target: TargetVector,
        frames_elapsed: u64,
    },
    /// Target generation failed; no agent was started.
    Failed(AgentError),
}

#[derive(Debug)]
enum RaceState {
    Inactive,
    Generating { started: u64 },
    Running { target: GeneratedTarget, started: u64 },
}

#[derive(Debug)]
pub struct RaceCoordinator<S = Vec<Vector3<f32>>> {
    generator: PostureGenerator,
    agents: Vec<SolverAgent>,
    sink: S,
    state: RaceState,
    reports: Receiver<AgentReport>,
    race: u64,
    frame: u64,
}

impl<S> RaceCoordinator<S>
where
    S: PoseSink,
{
    pub fn new(generator: PostureGenerator, mut agents: Vec<SolverAgent>, sink: S) -> Self {
        let (tx, rx) = mpsc::channel();
        for agent in &mut agents {
            agent.set_reporter(Sender::clone(&tx));
        }
        Self {
            generator,
            agents,
            sink,
            state: RaceState::Inactive,
            reports: rx,
            race: 0,
            frame: 0,
        }
    }

    #[must_use]
    pub fn agents(&self) -> &[SolverAgent] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&SolverAgent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    #[must_use]
    pub fn generator(&self) -> &PostureGenerator {
        &self.generator
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn is_racing(&self) -> bool {
        !matches!(self.state, RaceState::Inactive)
    }

    /// Number of races started so far.
    #[must_use]
    pub fn race_count(&self) -> u64 {
        self.race
    }

    /// Starts a race unless one is already in progress.
    pub fn run_race(&mut self) -> RaceStart {
        if self.is_racing() {
            debug!(race = self.race, "race already in progress");
            return RaceStart::AlreadyRunning;
        }
        // reports left over from a previous race
        while self.reports.try_recv().is_ok() {}
        if let Err(err) = self.generator.begin() {
            error!(%err, "posture generation could not start");
            return RaceStart::Failed(err);
        }
        self.race += 1;
        self.state = RaceState::Generating {
            started: self.frame,
        };
        info!(race = self.race, agents = self.agents.len(), "race started");
        RaceStart::Started
    }

    /// Cancels every agent and drops the race in progress, if any.
    pub fn abort_race(&mut self) {
        if self.is_racing() {
            warn!(race = self.race, "race aborted");
        }
        for agent in &mut self.agents {
            agent.cancel();
        }
        self.state = RaceState::Inactive;
    }

    pub fn on_tick(&mut self, tick: Tick) -> Option<RaceOutcome> {
        self.frame = tick.frame;
        match self.generator.on_tick(tick) {
            Ok(Some(generated)) => {
                if let Some(outcome) = self.launch(generated) {
                    return Some(outcome);
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!(%err, "posture generation failed");
                self.abort_race();
                return Some(RaceOutcome::Failed(err));
            }
        }

        for index in 0..self.agents.len() {
            self.agents[index].on_tick(tick);
            if let Some(outcome) = self.drain_reports() {
                return Some(outcome);
            }
        }
        self.check_exhausted()
    }

    /// Starts a race and ticks `clock` until it ends or `max_frames` pass.
    ///
    /// Returns `None` when the frame budget ran out; the race is aborted.
    pub fn run_to_completion(
        &mut self,
        clock: &mut TickClock,
        max_frames: u64,
    ) -> Option<RaceOutcome> {
        if let RaceStart::Failed(err) = self.run_race() {
            return Some(RaceOutcome::Failed(err));
        }
        let start = clock.frame();
        loop {
            let tick = clock.next_tick();
            if let Some(outcome) = self.on_tick(tick) {
                return Some(outcome);
            }
            if tick.frame.saturating_sub(start) >= max_frames {
                warn!(race = self.race, max_frames, "frame budget exhausted");
                self.abort_race();
                return None;
            }
        }
    }

    fn launch(&mut self, target: GeneratedTarget) -> Option<RaceOutcome> {
        let RaceState::Generating { started } = self.state else {
            debug!("target generated outside of a race");
            return None;
        };
        info!(
            race = self.race,
            posture = %target.posture,
            target = %target.target,
            "target ready"
        );
        let mut launched = 0;
        for agent in &mut self.agents {
            let result = agent
                .set_mode(AgentMode::Inference)
                .and_then(|()| agent.start(target.target));
            match result {
                Ok(()) => launched += 1,
                Err(err) => warn!(agent = %agent.id(), %err, "agent not started"),
            }
        }
        debug!(race = self.race, launched, "agents launched");
        self.state = RaceState::Running { target, started };
        None
    }

    fn drain_reports(&mut self) -> Option<RaceOutcome> {
        while let Ok(report) = self.reports.try_recv() {
            if !matches!(self.state, RaceState::Running { .. }) {
                debug!(agent = %report.agent, "report outside of a race ignored");
                continue;
            }
            match report.outcome {
                EpisodeOutcome::Succeeded => return self.declare_winner(&report),
                EpisodeOutcome::TimedOut | EpisodeOutcome::Stagnated => {
                    debug!(
                        agent = %report.agent,
                        outcome = %report.outcome,
                        "agent out of the race"
                    );
                }
            }
        }
        None
    }

    fn declare_winner(&mut self, report: &AgentReport) -> Option<RaceOutcome> {
        let RaceState::Running { target, started } =
            std::mem::replace(&mut self.state, RaceState::Inactive)
        else {
            return None;
        };
        for agent in &mut self.agents {
            if agent.id() != report.agent {
                agent.cancel();
            }
        }
        let rotations = self
            .agent(report.agent)
            .map(SolverAgent::controlled_rotations)
            .unwrap_or_default();
        let slots_written = copy_pose(&mut self.sink, &rotations);
        let summary = RaceSummary {
            race: self.race,
            winner: report.agent,
            posture: target.posture,
            steps: report.steps,
            reading: report.reading,
            target: target.target,
            total_error: report.total_error,
            rotations,
            frames_elapsed: self.frame.saturating_sub(started),
            slots_written,
        };
        info!(
            race = summary.race,
            winner = %summary.winner,
            steps = summary.steps,
            error = summary.total_error,
            frames = summary.frames_elapsed,
            slots_written,
            "race won"
        );
        info!(reading = %summary.reading, "winning readings");
        Some(RaceOutcome::Won(summary))
    }

    fn check_exhausted(&mut self) -> Option<RaceOutcome> {
        if !matches!(self.state, RaceState::Running { .. })
            || self.agents.iter().any(SolverAgent::is_active)
        {
            return None;
        }
        let RaceState::Running { target, started } =
            std::mem::replace(&mut self.state, RaceState::Inactive)
        else {
            return None;
        };
        let frames_elapsed = self.frame.saturating_sub(started);
        warn!(
            race = self.race,
            posture = %target.posture,
            frames_elapsed,
            "no agent matched the target"
        );
        Some(RaceOutcome::Exhausted {
            race: self.race,
            posture: target.posture,
            target: target.target,
            frames_elapsed,
        })
    }
}
